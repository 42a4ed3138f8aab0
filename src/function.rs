//! Native function values - callables that can cross the boundary
//!
//! `NativeFn<A, R>` is what both adapters produce and consume. It is an
//! `ArgType` of object kind itself, so functions can take and return
//! functions.

use crate::adapter;
use crate::convert::ArgType;
use crate::descriptor::FunctionalInterface;
use crate::dispatch::{Dispatch, ShapeOf};
use crate::error::{BridgeError, Result};
use crate::kind::Object;
use jbridge_runtime::{Env, RawObject};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Shared native callable `A -> R`
pub struct NativeFn<A, R> {
    inner: Arc<dyn Fn(A) -> Result<R> + Send + Sync>,
}

impl<A, R> NativeFn<A, R> {
    /// Wrap a fallible callable; its errors are thrown into managed callers
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> Result<R> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap an infallible callable
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: 'static,
        R: 'static,
    {
        Self::new(move |arg| Ok(f(arg)))
    }

    #[inline]
    pub fn call(&self, arg: A) -> Result<R> {
        (self.inner)(arg)
    }
}

impl<A, R> Clone for NativeFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: ArgType, R: ArgType> fmt::Debug for NativeFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn<{}, {}>", A::java_name(), R::java_name())
    }
}

impl<A, R> ArgType for NativeFn<A, R>
where
    A: ArgType,
    R: ArgType,
    A::Kind: Dispatch<R::Kind>,
{
    type Kind = Object;

    fn native_value(env: &dyn Env, value: RawObject) -> Result<Self> {
        if value.is_null() {
            return Err(BridgeError::null(
                <ShapeOf<A, R> as FunctionalInterface>::DESCRIPTOR.interface,
            ));
        }
        adapter::native_value(env, value)
    }

    fn java_value(env: &dyn Env, value: Self) -> Result<RawObject> {
        adapter::java_value(env, value)
    }

    fn java_name() -> Cow<'static, str> {
        Cow::Owned(<ShapeOf<A, R> as FunctionalInterface>::java_name::<A, R>())
    }
}
