mod common;

use common::{define_impl, instance, round_trip, sandbox, take_pending, test_int};
use jbridge::runtime::sandbox::names;
use jbridge::runtime::{Env, JValue};
use jbridge::{BridgeError, NativeFn};

fn define_thrower(vm: &jbridge::runtime::Vm) {
    define_impl(
        vm,
        "test/Thrower",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |env, _, args| {
            let value = args[0].as_int().unwrap_or_default();
            env.throw_new_by_name(names::ILLEGAL_ARGUMENT_EXCEPTION, &format!("bad value {value}"));
            JValue::Boolean(true)
        },
    );
}

#[test]
fn test_managed_throw_becomes_error() {
    let vm = sandbox();
    define_thrower(&vm);
    let env = vm.attach_current_thread();

    let thrower = instance(&*env, "test/Thrower");
    let predicate = jbridge::native_value::<i32, bool>(&*env, thrower).unwrap();
    env.delete_local_ref(thrower);

    match predicate.call(3) {
        Err(BridgeError::Exception(exception)) => {
            assert_eq!(exception.class_name(), "java.lang.IllegalArgumentException");
            assert_eq!(exception.message(), "java.lang.IllegalArgumentException: bad value 3");
        }
        other => panic!("expected a managed exception, got {other:?}"),
    }
    assert!(!env.exception_check());

    // The handle is usable again right away
    assert!(matches!(predicate.call(4), Err(BridgeError::Exception(_))));
}

#[test]
fn test_native_error_throws_runtime_exception() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let failing = NativeFn::new(|x: i32| -> jbridge::Result<bool> {
        Err(BridgeError::Conversion(format!("cannot test {x}")))
    });
    let managed = jbridge::java_value(&*env, failing).unwrap();

    assert!(!test_int(&*env, managed, 9));
    let (class, message) = take_pending(&env).unwrap();
    assert_eq!(class, names::RUNTIME_EXCEPTION);
    assert_eq!(message.as_deref(), Some("conversion failed: cannot test 9"));

    env.delete_local_ref(managed);
}

#[test]
fn test_native_error_comes_back_as_exception() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let failing = round_trip(
        &*env,
        NativeFn::new(|_: String| -> jbridge::Result<String> { Err(BridgeError::Conversion("nope".into())) }),
    );

    let error = failing.call("x".into()).unwrap_err();
    let exception = error.exception().unwrap();
    assert_eq!(exception.class_name(), "java.lang.RuntimeException");
    assert!(exception.message().contains("nope"));
}

#[test]
fn test_panic_becomes_runtime_exception() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let panicking = round_trip(
        &*env,
        NativeFn::from_fn(|x: i64| -> bool {
            if x < 0 {
                panic!("negative input {x}");
            }
            true
        }),
    );

    assert!(panicking.call(1).unwrap());
    let error = panicking.call(-1).unwrap_err();
    let exception = error.exception().unwrap();
    assert_eq!(exception.class_name(), "java.lang.RuntimeException");
    assert!(exception.message().contains("negative input -1"), "{}", exception.message());

    // Frames unwound cleanly
    assert_eq!(vm.stats().local_refs, 0);
}

#[test]
fn test_original_exception_propagates_through_native_code() {
    let vm = sandbox();
    define_thrower(&vm);
    let env = vm.attach_current_thread();

    let thrower = instance(&*env, "test/Thrower");
    let managed = jbridge::native_value::<i32, bool>(&*env, thrower).unwrap();
    env.delete_local_ref(thrower);

    // Native code that just forwards into the throwing managed predicate
    let forwarding = round_trip(&*env, NativeFn::new(move |x: i32| managed.call(x)));

    let error = forwarding.call(11).unwrap_err();
    let exception = error.exception().unwrap();
    assert_eq!(exception.class_name(), "java.lang.IllegalArgumentException");
    assert_eq!(exception.message(), "java.lang.IllegalArgumentException: bad value 11");
    assert!(!env.exception_check());
}

#[test]
fn test_null_argument_throws_null_pointer() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let managed = jbridge::java_value(&*env, NativeFn::from_fn(|s: String| s.len() as i32)).unwrap();
    let interface = env.find_class("java/util/function/ToIntFunction");
    let apply = env.get_method_id(interface, "applyAsInt", "(Ljava/lang/Object;)I");

    let result = env.call_int_method(managed, apply, &[JValue::Object(Default::default())]);
    assert_eq!(result, 0);
    let (class, _) = take_pending(&env).unwrap();
    assert_eq!(class, names::NULL_POINTER_EXCEPTION);

    env.delete_local_ref(interface);
    env.delete_local_ref(managed);
}

#[test]
fn test_errors_describe_themselves() {
    let released = BridgeError::Released {
        wrapper: "io/jbridge/function/NativePredicate".into(),
    };
    assert_eq!(
        released.to_string(),
        "native callback of io/jbridge/function/NativePredicate was already released"
    );
    assert!(!released.is_fatal());
    assert!(released.exception().is_none());
}
