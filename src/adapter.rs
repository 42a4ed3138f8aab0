//! Function adapters - the two directions a function value crosses in
//!
//! Managed to native: a functional interface instance becomes a `NativeFn`
//! holding a global reference and the method resolved once. Every call
//! re-acquires the calling thread's execution handle on the runtime that
//! owns the reference.
//!
//! Native to managed: a `NativeFn` is boxed into a `CallbackCell` and
//! handed to a freshly allocated wrapper instance that owns it from then on.

use crate::callback::{CallbackCell, ForwardingCallback};
use crate::class::Class;
use crate::config;
use crate::convert::ArgType;
use crate::descriptor::{
    FunctionalInterface, NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG, REGISTER_METHOD, REGISTER_SIG,
};
use crate::dispatch::{Dispatch, ShapeOf};
use crate::error::{check_exception, BridgeError, JavaException, Result};
use crate::function::NativeFn;
use crate::kind::Scoped;
use jbridge_runtime::logging::{log_callback_created, log_consistency_failure, log_crossing};
use jbridge_runtime::{thread, Env, GlobalRef, LocalRef, MethodId, RawObject, Runtime};
use std::sync::Arc;
use tracing::debug;

/// Managed functional interface instance as a native function
///
/// The interface is selected from the shape `A -> R`. `obj` stays owned by
/// the caller; the returned function keeps its own global reference.
pub fn native_value<A, R>(env: &dyn Env, obj: RawObject) -> Result<NativeFn<A, R>>
where
    A: ArgType,
    R: ArgType,
    A::Kind: Dispatch<R::Kind>,
{
    native_value_with::<ShapeOf<A, R>, A, R>(env, obj)
}

/// Like [`native_value`], for an explicitly chosen interface `S`
pub fn native_value_with<S, A, R>(env: &dyn Env, obj: RawObject) -> Result<NativeFn<A, R>>
where
    S: FunctionalInterface<ArgKind = A::Kind, RetKind = R::Kind>,
    A: ArgType,
    R: ArgType,
{
    let descriptor = S::DESCRIPTOR;
    if obj.is_null() {
        return Err(BridgeError::null(descriptor.interface));
    }

    let method = Class::of(env, obj)?.method_id(descriptor.method, descriptor.method_sig)?;
    let target = match GlobalRef::new(env, obj) {
        Some(target) => target,
        None => {
            check_exception(env)?;
            return Err(BridgeError::Conversion(format!(
                "could not hold {} globally",
                descriptor.interface
            )));
        }
    };

    debug!(target: "bridge", interface = descriptor.interface, "managed function captured");
    Ok(NativeFn::new(move |arg: A| {
        let env = current_env(descriptor.interface, target.runtime())?;
        call::<S, A, R>(&*env, &target, method, arg)
    }))
}

/// One crossing into managed code on the calling thread's handle
fn call<S, A, R>(env: &dyn Env, target: &GlobalRef, method: MethodId, arg: A) -> Result<R>
where
    S: FunctionalInterface<ArgKind = A::Kind, RetKind = R::Kind>,
    A: ArgType,
    R: ArgType,
{
    let arg = Scoped::<A::Kind>::new(env, A::java_value(env, arg)?);

    log_crossing(S::DESCRIPTOR.interface, S::DESCRIPTOR.method);
    let result = Scoped::<R::Kind>::new(env, S::invoke(env, target.raw(), method, arg.value()));
    drop(arg);

    check_exception(env)?;
    R::native_value(env, result.value())
}

/// Calling thread's handle on `runtime`, or a consistency failure
fn current_env(context: &str, runtime: &Arc<dyn Runtime>) -> Result<Arc<dyn Env>> {
    thread::current_env_for(runtime).map_err(|error| {
        log_consistency_failure(context, &error.to_string());
        if config::current().consistency.abort_on_detached {
            std::process::abort();
        }
        BridgeError::Detached(error)
    })
}

/// Native function as a new managed wrapper instance (a local reference
/// owned by the caller)
pub fn java_value<A, R>(env: &dyn Env, function: NativeFn<A, R>) -> Result<RawObject>
where
    A: ArgType,
    R: ArgType,
    A::Kind: Dispatch<R::Kind>,
{
    java_value_with::<ShapeOf<A, R>, A, R>(env, function)
}

/// Like [`java_value`], for an explicitly chosen interface `S`
pub fn java_value_with<S, A, R>(env: &dyn Env, function: NativeFn<A, R>) -> Result<RawObject>
where
    S: FunctionalInterface<ArgKind = A::Kind, RetKind = R::Kind>,
    A: ArgType,
    R: ArgType,
{
    let wrapper = S::DESCRIPTOR.wrapper_class;
    let class = Class::find(env, wrapper)?;
    let field = class.field_id(NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG)?;
    let register = class.method_id(REGISTER_METHOD, REGISTER_SIG)?;

    let instance = LocalRef::new(env, env.alloc_object(class.raw()));
    if instance.is_null() {
        if let Some(exception) = JavaException::take(env) {
            debug!(target: "bridge", wrapper, error = exception.message(), "wrapper allocation failed");
        }
        return Err(BridgeError::Allocation {
            class: wrapper.to_string(),
        });
    }

    let address = CallbackCell::new::<S, _>(ForwardingCallback::new(function)).into_address();
    env.set_long_field(instance.raw(), field, address);
    if let Err(error) = check_exception(env) {
        // Safety: the address was never published to managed code
        unsafe { CallbackCell::release(address) };
        return Err(error);
    }

    env.call_void_method(instance.raw(), register, &[]);
    if let Err(error) = check_exception(env) {
        // Unpublish first so the instance's own cleanup finds nothing to free
        env.set_long_field(instance.raw(), field, 0);
        // Safety: the field no longer refers to the cell
        unsafe { CallbackCell::release(address) };
        return Err(error);
    }

    log_callback_created(wrapper, address as usize);
    Ok(instance.into_raw())
}
