//! JVM backend - `Env` and `Runtime` over a real `JNIEnv`
//!
//! Design: Thin forwarding through the JNI function table. Handles are
//! obtained with `GetEnv` for the calling thread; the process-wide
//! `JvmRuntime` is installed once from `JNI_OnLoad` and doubles as the
//! fallback handle provider for threads that entered through a native
//! method.

use crate::env::{Env, Runtime};
use crate::error::AttachError;
use crate::logging::{debug, log_reference_leak};
use crate::thread::{self, HandleProvider};
use crate::value::{FieldId, JValue, MethodId, RawObject};
use jni_sys::{jboolean, jobject, jvalue, JNIEnv, JavaVM, JNI_EDETACHED, JNI_OK, JNI_VERSION_1_8};
use once_cell::sync::OnceCell;
use std::ffi::{c_void, CStr, CString};
use std::ptr;
use std::sync::Arc;
use std::thread::ThreadId;

static RUNTIME: OnceCell<Arc<JvmRuntime>> = OnceCell::new();

/// Call through the JNI function table, with a value for missing entries
macro_rules! jni {
    ($env:expr, $func:ident($($arg:expr),*) else $default:expr) => {{
        let raw = $env;
        // Safety: `raw` is a live JNIEnv for the calling thread
        match unsafe { (**raw).$func } {
            Some(f) => unsafe { f(raw, $($arg),*) },
            None => $default,
        }
    }};
}

#[inline]
fn obj(raw: RawObject) -> jobject {
    raw.as_ptr() as jobject
}

#[inline]
fn raw(obj: jobject) -> RawObject {
    RawObject::from_ptr(obj as *mut c_void)
}

fn to_jvalue(value: &JValue) -> jvalue {
    match *value {
        JValue::Void => jvalue { j: 0 },
        JValue::Boolean(v) => jvalue { z: v as jboolean },
        JValue::Byte(v) => jvalue { b: v },
        JValue::Char(v) => jvalue { c: v },
        JValue::Short(v) => jvalue { s: v },
        JValue::Int(v) => jvalue { i: v },
        JValue::Long(v) => jvalue { j: v },
        JValue::Float(v) => jvalue { f: v },
        JValue::Double(v) => jvalue { d: v },
        JValue::Object(v) => jvalue { l: obj(v) },
    }
}

/// Modified UTF-8 as the JVM expects it: NUL as `C0 80`, supplementary
/// characters as surrogate pairs
fn to_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 1);
    for c in value.chars() {
        match c as u32 {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x1_0000..=u32::MAX => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let unit = *unit as u32;
                    out.push((0xE0 | (unit >> 12)) as u8);
                    out.push((0x80 | ((unit >> 6) & 0x3F)) as u8);
                    out.push((0x80 | (unit & 0x3F)) as u8);
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}

fn from_modified_utf8(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        let (unit, width) = match b {
            0x00..=0x7F => (b, 1),
            0xC0..=0xDF if i + 1 < bytes.len() => (((b & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F), 2),
            0xE0..=0xEF if i + 2 < bytes.len() => (
                ((b & 0x0F) << 12) | ((bytes[i + 1] as u16 & 0x3F) << 6) | (bytes[i + 2] as u16 & 0x3F),
                3,
            ),
            _ => (0xFFFD, 1),
        };
        units.push(unit);
        i += width;
    }
    String::from_utf16_lossy(&units)
}

/// The process-wide Java virtual machine
pub struct JvmRuntime {
    vm: *mut JavaVM,
}

// Safety: the JavaVM pointer is valid for the life of the process and its
// invocation interface may be used from any thread
unsafe impl Send for JvmRuntime {}
unsafe impl Sync for JvmRuntime {}

impl JvmRuntime {
    /// Handle for the calling thread, if it is attached to the JVM
    pub fn env(self: &Arc<Self>) -> Result<JniEnv, AttachError> {
        let thread = std::thread::current().id();
        let mut env: *mut c_void = ptr::null_mut();

        let code = match unsafe { (**self.vm).GetEnv } {
            // Safety: `vm` came from the JVM in `JNI_OnLoad`
            Some(get_env) => unsafe { get_env(self.vm, &mut env, JNI_VERSION_1_8) },
            None => JNI_EDETACHED,
        };

        match code {
            JNI_OK if !env.is_null() => Ok(JniEnv {
                raw: env as *mut JNIEnv,
                runtime: self.clone(),
                owner: thread,
            }),
            JNI_EDETACHED => Err(AttachError::NotAttached { thread }),
            code => Err(AttachError::Refused { thread, code }),
        }
    }

    /// Attach the calling thread for the duration of `f`
    fn with_attached<R>(self: &Arc<Self>, f: impl FnOnce(&JniEnv) -> R) -> Result<R, AttachError> {
        if let Ok(env) = self.env() {
            return Ok(f(&env));
        }

        let thread = std::thread::current().id();
        let mut env: *mut c_void = ptr::null_mut();
        // Safety: attaching and detaching is legal from any native thread
        let code = match unsafe { (**self.vm).AttachCurrentThread } {
            Some(attach) => unsafe { attach(self.vm, &mut env, ptr::null_mut()) },
            None => return Err(AttachError::NotAttached { thread }),
        };
        if code != JNI_OK || env.is_null() {
            return Err(AttachError::Refused { thread, code });
        }

        let result = f(&JniEnv {
            raw: env as *mut JNIEnv,
            runtime: self.clone(),
            owner: thread,
        });

        if let Some(detach) = unsafe { (**self.vm).DetachCurrentThread } {
            unsafe { detach(self.vm) };
        }
        Ok(result)
    }
}

impl Runtime for JvmRuntime {
    fn name(&self) -> &str {
        "jvm"
    }

    fn delete_global_ref(&self, global: RawObject) {
        let Some(runtime) = RUNTIME.get() else {
            log_reference_leak(self.name(), "runtime not installed");
            return;
        };
        if let Err(error) = runtime.with_attached(|env| {
            jni!(env.raw, DeleteGlobalRef(obj(global)) else ());
        }) {
            log_reference_leak(self.name(), &error.to_string());
        }
    }
}

impl HandleProvider for Arc<JvmRuntime> {
    fn current(&self) -> Result<Arc<dyn Env>, AttachError> {
        self.env().map(|env| Arc::new(env) as Arc<dyn Env>)
    }
}

/// Install the JVM as the process runtime and fallback handle provider
///
/// # Safety
/// `vm` must be the `JavaVM` pointer handed to `JNI_OnLoad`.
pub unsafe fn on_load(vm: *mut JavaVM) -> Arc<JvmRuntime> {
    let runtime = RUNTIME.get_or_init(|| Arc::new(JvmRuntime { vm })).clone();
    thread::install_provider(Box::new(runtime.clone()));
    debug!(target: "jvm", "JVM runtime installed");
    runtime
}

/// The installed JVM runtime, if `on_load` has run
pub fn runtime() -> Option<Arc<JvmRuntime>> {
    RUNTIME.get().cloned()
}

/// Execution handle wrapping the calling thread's `JNIEnv`
pub struct JniEnv {
    raw: *mut JNIEnv,
    runtime: Arc<JvmRuntime>,
    owner: ThreadId,
}

// Safety: shared only through the per-thread registry; every call checks
// the owner thread in debug builds
unsafe impl Send for JniEnv {}
unsafe impl Sync for JniEnv {}

impl JniEnv {
    /// Wrap the `JNIEnv` a native method was invoked with
    ///
    /// # Safety
    /// `raw` must be the live `JNIEnv` of the calling thread.
    pub unsafe fn from_raw(raw: *mut JNIEnv) -> Option<Self> {
        let runtime = RUNTIME.get()?.clone();
        Some(Self {
            raw,
            runtime,
            owner: std::thread::current().id(),
        })
    }

    #[inline]
    fn env(&self) -> *mut JNIEnv {
        debug_assert_eq!(std::thread::current().id(), self.owner, "JNIEnv used off its thread");
        self.raw
    }
}

impl Env for JniEnv {
    fn runtime(&self) -> Arc<dyn Runtime> {
        self.runtime.clone()
    }

    fn find_class(&self, path: &str) -> RawObject {
        let Ok(name) = CString::new(path) else {
            return RawObject::null();
        };
        raw(jni!(self.env(), FindClass(name.as_ptr()) else ptr::null_mut()))
    }

    fn get_object_class(&self, target: RawObject) -> RawObject {
        raw(jni!(self.env(), GetObjectClass(obj(target)) else ptr::null_mut()))
    }

    fn get_method_id(&self, class: RawObject, name: &str, sig: &str) -> MethodId {
        let (Ok(name), Ok(sig)) = (CString::new(name), CString::new(sig)) else {
            return MethodId::null();
        };
        let id = jni!(self.env(), GetMethodID(obj(class), name.as_ptr(), sig.as_ptr()) else ptr::null_mut());
        MethodId::from_ptr(id as *mut c_void)
    }

    fn get_field_id(&self, class: RawObject, name: &str, sig: &str) -> FieldId {
        let (Ok(name), Ok(sig)) = (CString::new(name), CString::new(sig)) else {
            return FieldId::null();
        };
        let id = jni!(self.env(), GetFieldID(obj(class), name.as_ptr(), sig.as_ptr()) else ptr::null_mut());
        FieldId::from_ptr(id as *mut c_void)
    }

    fn alloc_object(&self, class: RawObject) -> RawObject {
        raw(jni!(self.env(), AllocObject(obj(class)) else ptr::null_mut()))
    }

    fn get_long_field(&self, target: RawObject, field: FieldId) -> i64 {
        jni!(self.env(), GetLongField(obj(target), field.as_ptr() as _) else 0)
    }

    fn set_long_field(&self, target: RawObject, field: FieldId, value: i64) {
        jni!(self.env(), SetLongField(obj(target), field.as_ptr() as _, value) else ())
    }

    fn call_void_method(&self, target: RawObject, method: MethodId, args: &[JValue]) {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        jni!(self.env(), CallVoidMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else ())
    }

    fn call_boolean_method(&self, target: RawObject, method: MethodId, args: &[JValue]) -> bool {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        jni!(self.env(), CallBooleanMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else 0) != 0
    }

    fn call_int_method(&self, target: RawObject, method: MethodId, args: &[JValue]) -> i32 {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        jni!(self.env(), CallIntMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else 0)
    }

    fn call_long_method(&self, target: RawObject, method: MethodId, args: &[JValue]) -> i64 {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        jni!(self.env(), CallLongMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else 0)
    }

    fn call_double_method(&self, target: RawObject, method: MethodId, args: &[JValue]) -> f64 {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        jni!(self.env(), CallDoubleMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else 0.0)
    }

    fn call_object_method(&self, target: RawObject, method: MethodId, args: &[JValue]) -> RawObject {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        raw(jni!(self.env(), CallObjectMethodA(obj(target), method.as_ptr() as _, args.as_ptr()) else ptr::null_mut()))
    }

    fn new_string_utf(&self, value: &str) -> RawObject {
        let mut bytes = to_modified_utf8(value);
        bytes.push(0);
        raw(jni!(self.env(), NewStringUTF(bytes.as_ptr() as *const _) else ptr::null_mut()))
    }

    fn get_string_utf(&self, string: RawObject) -> Option<String> {
        if string.is_null() {
            return None;
        }
        let chars = jni!(self.env(), GetStringUTFChars(obj(string), ptr::null_mut()) else ptr::null());
        if chars.is_null() {
            return None;
        }
        // Safety: the JVM returned a NUL-terminated buffer, released below
        let value = from_modified_utf8(unsafe { CStr::from_ptr(chars) }.to_bytes());
        jni!(self.env(), ReleaseStringUTFChars(obj(string), chars) else ());
        Some(value)
    }

    fn new_local_ref(&self, target: RawObject) -> RawObject {
        raw(jni!(self.env(), NewLocalRef(obj(target)) else ptr::null_mut()))
    }

    fn delete_local_ref(&self, target: RawObject) {
        jni!(self.env(), DeleteLocalRef(obj(target)) else ())
    }

    fn new_global_ref(&self, target: RawObject) -> RawObject {
        raw(jni!(self.env(), NewGlobalRef(obj(target)) else ptr::null_mut()))
    }

    fn delete_global_ref(&self, target: RawObject) {
        jni!(self.env(), DeleteGlobalRef(obj(target)) else ())
    }

    fn is_same_object(&self, a: RawObject, b: RawObject) -> bool {
        jni!(self.env(), IsSameObject(obj(a), obj(b)) else 0) != 0
    }

    fn exception_check(&self) -> bool {
        jni!(self.env(), ExceptionCheck() else 0) != 0
    }

    fn exception_occurred(&self) -> RawObject {
        raw(jni!(self.env(), ExceptionOccurred() else ptr::null_mut()))
    }

    fn exception_clear(&self) {
        jni!(self.env(), ExceptionClear() else ())
    }

    fn throw(&self, throwable: RawObject) {
        jni!(self.env(), Throw(obj(throwable)) else 0);
    }

    fn throw_new(&self, class: RawObject, message: &str) {
        let mut bytes = to_modified_utf8(message);
        bytes.push(0);
        jni!(self.env(), ThrowNew(obj(class), bytes.as_ptr() as *const _) else 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_utf8_nul_and_supplementary() {
        let encoded = to_modified_utf8("a\0b");
        assert_eq!(encoded, vec![b'a', 0xC0, 0x80, b'b']);

        let emoji = "\u{1F600}";
        let encoded = to_modified_utf8(emoji);
        assert_eq!(encoded.len(), 6);
        assert_eq!(from_modified_utf8(&encoded), emoji);
    }

    #[test]
    fn test_modified_utf8_plain_text() {
        for text in ["", "hello", "größe", "日本語"] {
            assert_eq!(from_modified_utf8(&to_modified_utf8(text)), text);
        }
    }
}
