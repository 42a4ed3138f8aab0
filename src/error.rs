//! Bridge errors - what a crossing can fail with
//!
//! Managed exceptions are taken off the execution handle as soon as they are
//! observed and carried natively as `JavaException`, so nothing stays
//! pending while native code unwinds through `?`.

use jbridge_runtime::logging::log_exception;
use jbridge_runtime::sandbox::names;
use jbridge_runtime::{AttachError, Env, GlobalRef, LocalRef, RawObject};
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, BridgeError>;

const THROWABLE: &str = "java.lang.Throwable";

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Exception thrown by managed code during a crossing
    #[error("managed exception: {0}")]
    Exception(#[from] JavaException),

    /// The managed runtime could not allocate a wrapper instance
    #[error("could not allocate an instance of {class}")]
    Allocation { class: String },

    /// No execution handle for the calling thread
    #[error("consistency failure: {0}")]
    Detached(#[from] AttachError),

    /// Class, method or field could not be resolved
    #[error("could not resolve {what}")]
    Lookup { what: String },

    /// A wrapper instance whose native callback is gone was invoked
    #[error("native callback of {wrapper} was already released")]
    Released { wrapper: String },

    #[error("null reference where {expected} was required")]
    NullReference { expected: String },

    #[error("conversion failed: {0}")]
    Conversion(String),

    /// A native callable panicked
    #[error("native callback panicked: {0}")]
    Panic(String),
}

impl BridgeError {
    /// Integration defects that must not be handled like ordinary failures
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Detached(_))
    }

    pub fn exception(&self) -> Option<&JavaException> {
        match self {
            Self::Exception(exception) => Some(exception),
            _ => None,
        }
    }

    pub(crate) fn null(expected: impl Into<String>) -> Self {
        Self::NullReference {
            expected: expected.into(),
        }
    }
}

/// A managed throwable, cleared from the handle and held globally
///
/// If the runtime refuses the global reference the exception is still
/// reported; only its class name and message survive.
pub struct JavaException {
    throwable: Option<GlobalRef>,
    class_name: String,
    message: String,
}

impl JavaException {
    /// Take the pending exception off `env`, if there is one
    pub fn take(env: &dyn Env) -> Option<Self> {
        if !env.exception_check() {
            return None;
        }

        let throwable = LocalRef::new(env, env.exception_occurred());
        env.exception_clear();

        let class_name = object_class_name(env, throwable.raw()).unwrap_or_else(|| THROWABLE.into());
        let message = string_method(env, throwable.raw(), "toString").unwrap_or_else(|| class_name.clone());
        log_exception(&class_name, &message);

        let global = GlobalRef::new(env, throwable.raw());
        if global.is_none() {
            warn!(target: "bridge", class = %class_name, "throwable could not be held globally");
        }

        Some(Self {
            throwable: global,
            class_name,
            message,
        })
    }

    /// Dotted class name, e.g. `java.lang.IllegalStateException`
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `toString()` of the throwable
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The throwable itself, unless the runtime refused to hold it
    pub fn throwable(&self) -> Option<&GlobalRef> {
        self.throwable.as_ref()
    }

    /// Make the exception pending again on `env`
    ///
    /// Without the original throwable, a new one of the same class (or
    /// `RuntimeException` if that class cannot be found) carries the message.
    pub fn rethrow(&self, env: &dyn Env) {
        if let Some(throwable) = &self.throwable {
            env.throw(throwable.raw());
            return;
        }

        let mut class = LocalRef::new(env, env.find_class(&self.class_name.replace('.', "/")));
        if class.is_null() {
            env.exception_clear();
            class = LocalRef::new(env, env.find_class(names::RUNTIME_EXCEPTION));
        }
        if !class.is_null() {
            env.throw_new(class.raw(), &self.message);
        }
    }
}

impl fmt::Debug for JavaException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JavaException")
            .field("class_name", &self.class_name)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for JavaException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JavaException {}

/// Fail with the pending exception, if any
pub fn check_exception(env: &dyn Env) -> Result<()> {
    match JavaException::take(env) {
        Some(exception) => Err(exception.into()),
        None => Ok(()),
    }
}

/// Call a no-argument `String` method, swallowing any failure
fn string_method(env: &dyn Env, obj: RawObject, name: &str) -> Option<String> {
    let class = LocalRef::new(env, env.get_object_class(obj));
    if class.is_null() {
        return None;
    }

    let method = env.get_method_id(class.raw(), name, "()Ljava/lang/String;");
    if env.exception_check() {
        env.exception_clear();
        return None;
    }

    let result = LocalRef::new(env, env.call_object_method(obj, method, &[]));
    if env.exception_check() {
        env.exception_clear();
        return None;
    }
    env.get_string_utf(result.raw())
}

/// Dotted name of a class object (`Class.getName()`)
pub(crate) fn class_name(env: &dyn Env, class: RawObject) -> Option<String> {
    string_method(env, class, "getName")
}

fn object_class_name(env: &dyn Env, obj: RawObject) -> Option<String> {
    let class = LocalRef::new(env, env.get_object_class(obj));
    if class.is_null() {
        return None;
    }
    class_name(env, class.raw())
}
