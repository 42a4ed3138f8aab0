//! Cross-runtime references - scoped local and global handles
//!
//! Design: RAII wrappers with deterministic release:
//! - `LocalRef` borrows the execution handle and dies with the call frame
//! - `GlobalRef` keeps its runtime alive and may be dropped on any thread

use crate::env::{Env, Runtime};
use crate::logging::trace;
use crate::value::RawObject;
use core::fmt;
use std::sync::Arc;

/// Short-lived reference, released when the scope ends
pub struct LocalRef<'env> {
    env: &'env dyn Env,
    raw: RawObject,
}

impl<'env> LocalRef<'env> {
    /// Take ownership of a local reference returned by `env`
    #[inline]
    pub fn new(env: &'env dyn Env, raw: RawObject) -> Self {
        Self { env, raw }
    }

    /// Create an additional local reference to `raw`, leaving `raw` untouched
    #[inline]
    pub fn duplicate(env: &'env dyn Env, raw: RawObject) -> Self {
        let raw = if raw.is_null() {
            raw
        } else {
            env.new_local_ref(raw)
        };
        Self { env, raw }
    }

    #[inline]
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    #[inline]
    pub fn env(&self) -> &'env dyn Env {
        self.env
    }

    /// Give up ownership without releasing (e.g. to return it to managed code)
    #[inline]
    pub fn into_raw(self) -> RawObject {
        let raw = self.raw;
        core::mem::forget(self);
        raw
    }
}

impl Drop for LocalRef<'_> {
    #[inline]
    fn drop(&mut self) {
        if !self.raw.is_null() {
            self.env.delete_local_ref(self.raw);
        }
    }
}

impl fmt::Debug for LocalRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalRef").field(&self.raw).finish()
    }
}

/// Long-lived reference, released when the last owner drops it
///
/// Holds its runtime so release works from any thread, including threads
/// that are no longer (or never were) attached.
pub struct GlobalRef {
    raw: RawObject,
    runtime: Arc<dyn Runtime>,
}

impl GlobalRef {
    /// Promote `obj` (any live reference) to a new global reference
    ///
    /// Returns `None` for null objects or if the runtime refused.
    pub fn new(env: &dyn Env, obj: RawObject) -> Option<Self> {
        if obj.is_null() {
            return None;
        }

        let raw = env.new_global_ref(obj);
        if raw.is_null() {
            return None;
        }

        trace!(target: "reference", global = ?raw, "global reference created");
        Some(Self {
            raw,
            runtime: env.runtime(),
        })
    }

    #[inline]
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    /// New local reference to the same object, scoped to `env`
    pub fn to_local<'env>(&self, env: &'env dyn Env) -> LocalRef<'env> {
        LocalRef::new(env, env.new_local_ref(self.raw))
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        trace!(target: "reference", global = ?self.raw, "global reference released");
        self.runtime.delete_global_ref(self.raw);
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRef")
            .field("raw", &self.raw)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}
