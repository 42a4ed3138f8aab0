mod common;

use common::{define_impl, instance, round_trip, sandbox};
use jbridge::runtime::{thread, AttachError, Env, JValue};
use jbridge::{BridgeError, NativeFn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_closure_on_another_attached_thread() {
    let vm = sandbox();
    let env = vm.attach_current_thread();
    let even = round_trip(&*env, NativeFn::from_fn(|x: i32| x % 2 == 0));

    let worker_vm = vm.clone();
    let results = std::thread::spawn(move || {
        let _attachment = worker_vm.attach_current_thread();
        (even.call(4).unwrap(), even.call(7).unwrap())
    })
    .join()
    .unwrap();

    assert_eq!(results, (true, false));
    assert_eq!(vm.stats().affinity_violations, 0);
}

#[test]
fn test_unattached_thread_is_detached() {
    let vm = sandbox();
    define_impl(
        &vm,
        "test/Always",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |_, _, _| JValue::Boolean(true),
    );
    let env = vm.attach_current_thread();
    let obj = instance(&*env, "test/Always");
    let always = jbridge::native_value::<i32, bool>(&*env, obj).unwrap();
    env.delete_local_ref(obj);

    let error = std::thread::spawn(move || {
        assert!(!thread::is_attached());
        always.call(1).unwrap_err()
    })
    .join()
    .unwrap();

    assert!(matches!(error, BridgeError::Detached(_)));
    assert!(error.is_fatal());
    assert!(error.to_string().starts_with("consistency failure"));
}

#[test]
fn test_concurrent_callers() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let shout = round_trip(
        &*env,
        NativeFn::from_fn(move |s: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.to_uppercase()
        }),
    );

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let vm = vm.clone();
            let shout = shout.clone();
            scope.spawn(move || {
                let _attachment = vm.attach_current_thread();
                for i in 0..50 {
                    let input = format!("w{worker}-{i}");
                    assert_eq!(shout.call(input.clone()).unwrap(), input.to_uppercase());
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 200);
    assert_eq!(vm.stats().affinity_violations, 0);
    assert_eq!(vm.stats().local_refs, 0);
}

#[test]
fn test_nested_attachments_restore_outer_handle() {
    let vm = sandbox();
    let outer = vm.attach_current_thread();
    let even = round_trip(&*outer, NativeFn::from_fn(|x: i32| x % 2 == 0));

    {
        let _inner = vm.attach_current_thread();
        assert_eq!(thread::attach_depth(), 2);
        assert!(even.call(2).unwrap());
    }

    assert_eq!(thread::attach_depth(), 1);
    assert!(!even.call(3).unwrap());
    assert!(!outer.exception_check());
}

#[test]
fn test_call_uses_handle_of_owning_runtime() {
    let first = sandbox();
    define_impl(
        &first,
        "test/IsEven",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |_, _, args| JValue::Boolean(args[0].as_int().unwrap_or(1) % 2 == 0),
    );
    let first_env = first.attach_current_thread();
    let obj = instance(&*first_env, "test/IsEven");
    let even = jbridge::native_value::<i32, bool>(&*first_env, obj).unwrap();
    first_env.delete_local_ref(obj);

    // A second runtime attached on top, with an answer of its own
    let second = sandbox();
    define_impl(
        &second,
        "test/AlwaysTrue",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |_, _, _| JValue::Boolean(true),
    );
    let second_env = second.attach_current_thread();
    let other = instance(&*second_env, "test/AlwaysTrue");
    let always = jbridge::native_value::<i32, bool>(&*second_env, other).unwrap();
    second_env.delete_local_ref(other);
    assert_eq!(thread::attach_depth(), 2);

    assert!(!even.call(7).unwrap());
    assert!(even.call(4).unwrap());
    assert!(always.call(7).unwrap());
    assert!(!first_env.exception_check());
    assert!(!second_env.exception_check());
}

#[test]
fn test_thread_attached_only_elsewhere_is_detached() {
    let first = sandbox();
    let first_env = first.attach_current_thread();
    let even = round_trip(&*first_env, NativeFn::from_fn(|x: i32| x % 2 == 0));

    let second = sandbox();
    let error = std::thread::spawn(move || {
        let _attachment = second.attach_current_thread();
        even.call(2).unwrap_err()
    })
    .join()
    .unwrap();

    match &error {
        BridgeError::Detached(AttachError::OtherRuntime { runtime, .. }) => assert_eq!(runtime, "sandbox"),
        other => panic!("expected a missing handle on the owning runtime, got {other:?}"),
    }
    assert!(error.is_fatal());
}
