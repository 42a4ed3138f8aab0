mod common;

use common::{define_impl, instance, sandbox, test_int};
use jbridge::runtime::{ClassBuilder, Env, GlobalRef, JValue};
use jbridge::NativeFn;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Sets its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn flagged_predicate() -> (NativeFn<i32, bool>, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(dropped.clone());
    let function = NativeFn::from_fn(move |x: i32| {
        let _keep = &flag;
        x > 0
    });
    (function, dropped)
}

#[test]
fn test_callback_released_with_wrapper() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let (function, dropped) = flagged_predicate();
    let managed = jbridge::java_value(&*env, function).unwrap();
    assert!(test_int(&*env, managed, 1));
    assert!(!dropped.load(Ordering::SeqCst));

    env.delete_local_ref(managed);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(vm.hooks_run(), 1);
    assert_eq!(vm.stats().live_objects, 0);
}

#[test]
fn test_global_reference_keeps_callback() {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let (function, dropped) = flagged_predicate();
    let managed = jbridge::java_value(&*env, function).unwrap();
    let held = GlobalRef::new(&*env, managed).unwrap();
    env.delete_local_ref(managed);
    assert!(!dropped.load(Ordering::SeqCst));

    assert!(!test_int(&*env, held.raw(), -3));

    drop(held);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_closure_outlives_callers_reference() {
    let vm = sandbox();
    let cleaned = Arc::new(AtomicUsize::new(0));
    let counter = cleaned.clone();
    vm.define_class(
        ClassBuilder::new("test/Positive")
            .implements("java/util/function/IntPredicate")
            .method("test", "(I)Z", |_, _, args| {
                JValue::Boolean(args[0].as_int().unwrap_or_default() > 0)
            })
            .on_cleanup(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .unwrap();
    let env = vm.attach_current_thread();

    let obj = instance(&*env, "test/Positive");
    let positive = jbridge::native_value::<i32, bool>(&*env, obj).unwrap();
    env.delete_local_ref(obj);
    assert_eq!(cleaned.load(Ordering::SeqCst), 0);

    assert!(positive.call(5).unwrap());
    assert!(!positive.call(-5).unwrap());

    let copy = positive.clone();
    drop(positive);
    assert_eq!(cleaned.load(Ordering::SeqCst), 0);
    assert!(copy.call(1).unwrap());

    drop(copy);
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}

#[test]
fn test_closure_dropped_off_thread() {
    let vm = sandbox();
    define_impl(
        &vm,
        "test/Negative",
        "java/util/function/IntPredicate",
        "test",
        "(I)Z",
        |_, _, args| JValue::Boolean(args[0].as_int().unwrap_or_default() < 0),
    );
    let env = vm.attach_current_thread();

    let obj = instance(&*env, "test/Negative");
    let negative = jbridge::native_value::<i32, bool>(&*env, obj).unwrap();
    env.delete_local_ref(obj);
    assert_eq!(vm.stats().global_refs, 1);

    // No handle on the other thread: the release goes through the runtime
    std::thread::spawn(move || drop(negative)).join().unwrap();
    assert_eq!(vm.stats().global_refs, 0);
    assert_eq!(vm.stats().live_objects, 0);
    assert_eq!(vm.stats().invalid_releases, 0);
}

#[test]
fn test_detach_releases_outstanding_locals() {
    let vm = sandbox();
    let (function, dropped) = flagged_predicate();

    {
        let env = vm.attach_current_thread();
        let _leaked = jbridge::java_value(&*env, function).unwrap();
    }

    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(vm.stats().live_objects, 0);
}
