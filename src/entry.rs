//! Entry glue - managed code calling a wrapper's abstract method
//!
//! Runs on the managed runtime's thread with the handle it passed in.
//! Failures never unwind into managed code: they become a pending
//! exception and the zero value of the result kind.

use crate::callback::CallbackCell;
use crate::class::Class;
use crate::config;
use crate::descriptor::{FunctionalInterface, NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG};
use crate::error::{check_exception, BridgeError, Result};
use crate::kind::{Crossing, ValueKind};
use jbridge_runtime::logging::log_callback_failure;
use jbridge_runtime::sandbox::names;
use jbridge_runtime::{Env, LocalRef, RawObject};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::trace;

/// Invoke the native callback behind wrapper instance `this`
pub fn entry<S: FunctionalInterface>(
    env: &dyn Env,
    this: RawObject,
    arg: Crossing<S::ArgKind>,
) -> Crossing<S::RetKind> {
    let wrapper = S::DESCRIPTOR.wrapper_class;
    trace!(target: "callback", wrapper, "managed call into native callback");

    match invoke::<S>(env, this, arg) {
        Ok(result) => result,
        Err(error) => {
            throw_error(env, wrapper, &error);
            S::RetKind::zero()
        }
    }
}

fn invoke<S: FunctionalInterface>(
    env: &dyn Env,
    this: RawObject,
    arg: Crossing<S::ArgKind>,
) -> Result<Crossing<S::RetKind>> {
    let field = Class::of(env, this)?.field_id(NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG)?;
    let address = env.get_long_field(this, field);
    check_exception(env)?;

    // Safety: `nativePointer` only ever holds 0 or a live cell address; the
    // wrapper is reachable from this frame, so its cleanup cannot run yet
    let cell = unsafe { CallbackCell::from_address(address) }.ok_or_else(|| BridgeError::Released {
        wrapper: S::DESCRIPTOR.wrapper_class.to_string(),
    })?;
    let callback = cell.callback::<S>()?;

    if !config::current().callbacks.catch_panics {
        return callback.invoke(env, arg);
    }

    match panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(env, arg))) {
        Ok(result) => result,
        Err(payload) => Err(BridgeError::Panic(panic_message(payload.as_ref()))),
    }
}

/// Make `error` the pending exception on `env`
///
/// Propagated managed exceptions are rethrown as they are; native failures
/// become `IllegalStateException` (released callback),
/// `NullPointerException` (null reference) or `RuntimeException`.
pub fn throw_error(env: &dyn Env, wrapper: &str, error: &BridgeError) {
    if env.exception_check() {
        return;
    }

    log_callback_failure(wrapper, &error.to_string());
    let class = match error {
        BridgeError::Exception(exception) => {
            exception.rethrow(env);
            return;
        }
        BridgeError::Released { .. } => names::ILLEGAL_STATE_EXCEPTION,
        BridgeError::NullReference { .. } => names::NULL_POINTER_EXCEPTION,
        _ => names::RUNTIME_EXCEPTION,
    };

    let class = LocalRef::new(env, env.find_class(class));
    if !class.is_null() {
        env.throw_new(class.raw(), &error.to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_messages() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");

        let payload = panic::catch_unwind(|| std::panic::panic_any(5_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
