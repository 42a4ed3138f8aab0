//! Conversion rules - how each native type crosses the boundary
//!
//! Design: One `ArgType` impl per native type, fixing its kind and both
//! directions. Ownership follows JNI: `native_value` borrows the crossing
//! value (the caller keeps its local reference), `java_value` hands back a
//! new local reference the caller must release.

use crate::error::{check_exception, BridgeError, Result};
use crate::kind::{self, Crossing, ValueKind};
use jbridge_runtime::{Env, GlobalRef, RawObject};
use std::borrow::Cow;

/// Native type usable as a function argument or result
pub trait ArgType: Sized + 'static {
    type Kind: ValueKind;

    /// Managed crossing value into its native representation
    fn native_value(env: &dyn Env, value: Crossing<Self::Kind>) -> Result<Self>;

    /// Native value into a crossing value owned by the caller
    fn java_value(env: &dyn Env, value: Self) -> Result<Crossing<Self::Kind>>;

    /// Java source name, e.g. `int` or `java.lang.String`
    fn java_name() -> Cow<'static, str>;
}

macro_rules! primitive_arg {
    ($ty:ty, $kind:ty, $name:literal) => {
        impl ArgType for $ty {
            type Kind = $kind;

            #[inline]
            fn native_value(_env: &dyn Env, value: $ty) -> Result<$ty> {
                Ok(value)
            }

            #[inline]
            fn java_value(_env: &dyn Env, value: $ty) -> Result<$ty> {
                Ok(value)
            }

            fn java_name() -> Cow<'static, str> {
                Cow::Borrowed($name)
            }
        }
    };
}

primitive_arg!(bool, kind::Boolean, "boolean");
primitive_arg!(i32, kind::Int, "int");
primitive_arg!(i64, kind::Long, "long");
primitive_arg!(f64, kind::Double, "double");

impl ArgType for String {
    type Kind = kind::Object;

    fn native_value(env: &dyn Env, value: RawObject) -> Result<Self> {
        if value.is_null() {
            return Err(BridgeError::null("java.lang.String"));
        }
        env.get_string_utf(value)
            .ok_or_else(|| BridgeError::Conversion("object is not a java.lang.String".into()))
    }

    fn java_value(env: &dyn Env, value: Self) -> Result<RawObject> {
        let string = env.new_string_utf(&value);
        if string.is_null() {
            check_exception(env)?;
            return Err(BridgeError::Allocation {
                class: "java.lang.String".into(),
            });
        }
        Ok(string)
    }

    fn java_name() -> Cow<'static, str> {
        Cow::Borrowed("java.lang.String")
    }
}

/// Any managed object, held through a global reference on the native side
impl ArgType for GlobalRef {
    type Kind = kind::Object;

    fn native_value(env: &dyn Env, value: RawObject) -> Result<Self> {
        if value.is_null() {
            return Err(BridgeError::null("java.lang.Object"));
        }
        match GlobalRef::new(env, value) {
            Some(global) => Ok(global),
            None => {
                check_exception(env)?;
                Err(BridgeError::Conversion("global reference refused".into()))
            }
        }
    }

    fn java_value(env: &dyn Env, value: Self) -> Result<RawObject> {
        Ok(env.new_local_ref(value.raw()))
    }

    fn java_name() -> Cow<'static, str> {
        Cow::Borrowed("java.lang.Object")
    }
}

/// Nullable object: `None` crosses as `null`
impl<T> ArgType for Option<T>
where
    T: ArgType<Kind = kind::Object>,
{
    type Kind = kind::Object;

    fn native_value(env: &dyn Env, value: RawObject) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::native_value(env, value).map(Some)
    }

    fn java_value(env: &dyn Env, value: Self) -> Result<RawObject> {
        match value {
            Some(value) => T::java_value(env, value),
            None => Ok(RawObject::null()),
        }
    }

    fn java_name() -> Cow<'static, str> {
        T::java_name()
    }
}
