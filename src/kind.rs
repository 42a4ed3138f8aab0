//! Value kinds - the closed set of crossing representations
//!
//! Every native type that crosses the boundary maps to exactly one kind.
//! Kinds decide the primitive slot a value travels in and how a crossing
//! value is released once the call that produced it is done.

use jbridge_runtime::{Env, JValue, JavaType, RawObject};
use std::fmt::Debug;

mod sealed {
    pub trait Sealed {}
}

/// Crossing representation of one primitive slot (or object reference)
pub trait ValueKind: sealed::Sealed + Send + Sync + 'static {
    /// Value as it travels through a typed call
    type Crossing: Copy + Debug + Send + Sync;

    const JAVA_TYPE: JavaType;

    /// Field signature of the slot (`Z`, `I`, `J`, `D`, `Ljava/lang/Object;`)
    const SIGNATURE: &'static str;

    fn zero() -> Self::Crossing;

    fn into_jvalue(value: Self::Crossing) -> JValue;

    fn from_jvalue(value: JValue) -> Option<Self::Crossing>;

    /// Release a crossing value the caller owns (object local references)
    #[inline]
    fn release(_env: &dyn Env, _value: &Self::Crossing) {}
}

macro_rules! primitive_kind {
    ($(#[$doc:meta])* $name:ident, $crossing:ty, $java:ident, $sig:literal, $zero:expr, $as:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {}

        impl sealed::Sealed for $name {}

        impl ValueKind for $name {
            type Crossing = $crossing;

            const JAVA_TYPE: JavaType = JavaType::$java;
            const SIGNATURE: &'static str = $sig;

            #[inline]
            fn zero() -> $crossing {
                $zero
            }

            #[inline]
            fn into_jvalue(value: $crossing) -> JValue {
                JValue::$java(value)
            }

            #[inline]
            fn from_jvalue(value: JValue) -> Option<$crossing> {
                value.$as()
            }
        }
    };
}

primitive_kind!(
    /// `boolean` slot
    Boolean, bool, Boolean, "Z", false, as_bool
);
primitive_kind!(
    /// `int` slot
    Int, i32, Int, "I", 0, as_int
);
primitive_kind!(
    /// `long` slot
    Long, i64, Long, "J", 0, as_long
);
primitive_kind!(
    /// `double` slot
    Double, f64, Double, "D", 0.0, as_double
);

/// Object reference slot; crossing values are local references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {}

impl sealed::Sealed for Object {}

impl ValueKind for Object {
    type Crossing = RawObject;

    const JAVA_TYPE: JavaType = JavaType::Object;
    const SIGNATURE: &'static str = "Ljava/lang/Object;";

    #[inline]
    fn zero() -> RawObject {
        RawObject::null()
    }

    #[inline]
    fn into_jvalue(value: RawObject) -> JValue {
        JValue::Object(value)
    }

    #[inline]
    fn from_jvalue(value: JValue) -> Option<RawObject> {
        value.as_object()
    }

    #[inline]
    fn release(env: &dyn Env, value: &RawObject) {
        if !value.is_null() {
            env.delete_local_ref(*value);
        }
    }
}

/// Crossing type of a kind
pub type Crossing<K> = <K as ValueKind>::Crossing;

/// Local scope for a crossing value: released when dropped, whatever the
/// path out of the scope
pub struct Scoped<'env, K: ValueKind> {
    env: &'env dyn Env,
    value: K::Crossing,
}

impl<'env, K: ValueKind> Scoped<'env, K> {
    #[inline]
    pub fn new(env: &'env dyn Env, value: K::Crossing) -> Self {
        Self { env, value }
    }

    #[inline]
    pub fn value(&self) -> K::Crossing {
        self.value
    }
}

impl<K: ValueKind> Drop for Scoped<'_, K> {
    #[inline]
    fn drop(&mut self) {
        K::release(self.env, &self.value);
    }
}
