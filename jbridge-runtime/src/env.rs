//! Execution handle - the per-thread entry point into a managed runtime
//!
//! Design: A raw, JNI-shaped surface. Failing lookups return null handles
//! and leave an exception pending, exactly like the JVM does; callers are
//! responsible for testing `exception_check` right after every crossing.
//!
//! Only `delete_local_ref`, `delete_global_ref` and the `exception_*`
//! operations may be used while an exception is pending.

use crate::value::{FieldId, JValue, MethodId, RawObject};
use std::sync::Arc;

/// Thread-affine execution handle
///
/// An `Env` must only be used on the thread it was obtained on. Share it
/// through the registry in [`crate::thread`], never across threads.
pub trait Env: Send + Sync {
    /// Runtime that owns this handle (outlives every handle it creates)
    fn runtime(&self) -> Arc<dyn Runtime>;

    // ===== Classes, methods and fields =====

    /// Look up a class by slash-separated path, e.g. `java/lang/String`
    fn find_class(&self, path: &str) -> RawObject;

    /// Class of an object instance (new local reference)
    fn get_object_class(&self, obj: RawObject) -> RawObject;

    /// Resolve an instance method by name and descriptor
    fn get_method_id(&self, class: RawObject, name: &str, sig: &str) -> MethodId;

    /// Resolve an instance field by name and type signature
    fn get_field_id(&self, class: RawObject, name: &str, sig: &str) -> FieldId;

    /// Allocate an instance without running any constructor
    fn alloc_object(&self, class: RawObject) -> RawObject;

    fn get_long_field(&self, obj: RawObject, field: FieldId) -> i64;

    fn set_long_field(&self, obj: RawObject, field: FieldId, value: i64);

    // ===== Typed calls, one per result kind =====

    fn call_void_method(&self, obj: RawObject, method: MethodId, args: &[JValue]);

    fn call_boolean_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> bool;

    fn call_int_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> i32;

    fn call_long_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> i64;

    fn call_double_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> f64;

    /// Returns a new local reference owned by the caller (possibly null)
    fn call_object_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> RawObject;

    // ===== Strings =====

    fn new_string_utf(&self, value: &str) -> RawObject;

    /// Contents of a string object, `None` if `obj` is null or not a string
    fn get_string_utf(&self, obj: RawObject) -> Option<String>;

    // ===== References =====

    fn new_local_ref(&self, obj: RawObject) -> RawObject;

    fn delete_local_ref(&self, obj: RawObject);

    fn new_global_ref(&self, obj: RawObject) -> RawObject;

    fn delete_global_ref(&self, obj: RawObject);

    fn is_same_object(&self, a: RawObject, b: RawObject) -> bool;

    // ===== Exceptions =====

    fn exception_check(&self) -> bool;

    /// Pending throwable as a new local reference (null if none)
    fn exception_occurred(&self) -> RawObject;

    fn exception_clear(&self);

    fn throw(&self, throwable: RawObject);

    fn throw_new(&self, class: RawObject, message: &str);
}

/// Process-wide owner of a managed runtime
///
/// Global references outlive the call that created them and may be dropped
/// on any thread, so their release goes through the runtime rather than a
/// thread-affine handle.
pub trait Runtime: Send + Sync {
    /// Short name for diagnostics (`sandbox`, `jvm`)
    fn name(&self) -> &str;

    /// Release a global reference, from whichever thread drops it
    fn delete_global_ref(&self, obj: RawObject);
}

/// Whether two handles on runtimes point at the same runtime instance
#[inline]
pub fn same_runtime(a: &Arc<dyn Runtime>, b: &Arc<dyn Runtime>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
