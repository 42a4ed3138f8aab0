//! End-to-end usage: managed implementations used natively and native
//! closures handed to managed code.

mod common;

use common::{define_impl, instance, round_trip, sandbox};
use jbridge::runtime::{Env, JValue};
use jbridge::NativeFn;

#[test]
fn test_is_even_from_managed_implementation() {
    let vm = sandbox();
    define_impl(
        &vm,
        "demo/IsEven",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |_, _, args| JValue::Boolean(args[0].as_int().unwrap_or(1) % 2 == 0),
    );
    let env = vm.attach_current_thread();

    let obj = instance(&*env, "demo/IsEven");
    let is_even = jbridge::native_value::<i32, bool>(&*env, obj).unwrap();
    env.delete_local_ref(obj);

    assert!(is_even.call(4).unwrap());
    assert!(!is_even.call(7).unwrap());
}

#[test]
fn test_is_even_round_trip() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let is_even = round_trip(&*env, NativeFn::from_fn(|x: i32| x % 2 == 0));
    assert!(is_even.call(4).unwrap());
    assert!(!is_even.call(7).unwrap());
}

#[test]
fn test_uppercase_from_managed_implementation() {
    let vm = sandbox();
    define_impl(
        &vm,
        "demo/Upper",
        "java/util/function/Function",
        "apply",
        "(Ljava/lang/Object;)Ljava/lang/Object;",
        |env, _, args| {
            let input = args[0]
                .as_object()
                .and_then(|s| env.get_string_utf(s))
                .unwrap_or_default();
            JValue::Object(env.new_string_utf(&input.to_uppercase()))
        },
    );
    let env = vm.attach_current_thread();

    let obj = instance(&*env, "demo/Upper");
    let upper = jbridge::native_value::<String, String>(&*env, obj).unwrap();
    env.delete_local_ref(obj);

    assert_eq!(upper.call("abc".into()).unwrap(), "ABC");
    assert_eq!(vm.stats().local_refs, 0);
}

#[test]
fn test_uppercase_round_trip() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let upper = round_trip(&*env, NativeFn::from_fn(|s: String| s.to_uppercase()));
    assert_eq!(upper.call("abc".into()).unwrap(), "ABC");

    drop(upper);
    assert_eq!(vm.stats().live_objects, 0);
}

#[test]
fn test_managed_code_calls_native_closure() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let managed = jbridge::java_value(&*env, NativeFn::from_fn(|s: String| s.to_uppercase())).unwrap();
    let interface = env.find_class("java/util/function/Function");
    let apply = env.get_method_id(interface, "apply", "(Ljava/lang/Object;)Ljava/lang/Object;");

    let arg = env.new_string_utf("abc");
    let result = env.call_object_method(managed, apply, &[JValue::Object(arg)]);
    assert!(!env.exception_check());
    assert_eq!(env.get_string_utf(result).as_deref(), Some("ABC"));

    for raw in [result, arg, interface, managed] {
        env.delete_local_ref(raw);
    }
    assert_eq!(vm.stats().local_refs, 0);
}
