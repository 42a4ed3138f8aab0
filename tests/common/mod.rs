//! Shared fixtures for the integration tests
#![allow(dead_code)]

use jbridge::runtime::sandbox::VmEnv;
use jbridge::runtime::{ClassBuilder, Env, JValue, RawObject, Vm};
use jbridge::{ArgType, Dispatch, NativeFn};

/// Sandbox with the wrapper classes installed
pub fn sandbox() -> Vm {
    let vm = Vm::new().unwrap();
    jbridge::sandbox::install_wrapper_classes(&vm).unwrap();
    vm
}

/// Send a native function into managed code and capture it back
///
/// Every call on the result goes native -> managed -> native.
pub fn round_trip<A, R>(env: &dyn Env, function: NativeFn<A, R>) -> NativeFn<A, R>
where
    A: ArgType,
    R: ArgType,
    A::Kind: Dispatch<R::Kind>,
{
    let managed = jbridge::java_value(env, function).unwrap();
    let back = jbridge::native_value::<A, R>(env, managed).unwrap();
    env.delete_local_ref(managed);
    back
}

/// Define a managed class implementing `interface` with a single method
pub fn define_impl<F>(vm: &Vm, class: &str, interface: &str, method: &str, sig: &str, body: F)
where
    F: Fn(&VmEnv, RawObject, &[JValue]) -> JValue + Send + Sync + 'static,
{
    vm.define_class(
        ClassBuilder::new(class)
            .implements(interface)
            .method(method, sig, body),
    )
    .unwrap();
}

/// New instance of a managed class (a local reference)
pub fn instance(env: &dyn Env, class: &str) -> RawObject {
    let class = env.find_class(class);
    let obj = env.alloc_object(class);
    env.delete_local_ref(class);
    obj
}

/// Clear the pending exception, returning its class and message
pub fn take_pending(env: &VmEnv) -> Option<(String, Option<String>)> {
    let throwable = env.exception_occurred();
    if throwable.is_null() {
        return None;
    }
    env.exception_clear();
    let class = env.class_name_of(throwable).unwrap_or_default();
    let message = env.throwable_message(throwable);
    env.delete_local_ref(throwable);
    Some((class, message))
}

/// Call the interface method of a managed `IntPredicate`
pub fn test_int(env: &dyn Env, predicate: RawObject, value: i32) -> bool {
    let interface = env.find_class("java/util/function/IntPredicate");
    let method = env.get_method_id(interface, "test", "(I)Z");
    env.delete_local_ref(interface);
    env.call_boolean_method(predicate, method, &[JValue::Int(value)])
}
