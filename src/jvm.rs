//! JNI exports - native methods of the wrapper classes under `java/`
//!
//! Each wrapper declares its interface method `native`; the JVM links it to
//! the matching `Java_io_jbridge_function_*` symbol below. The incoming
//! `JNIEnv` is registered for the calling thread for the duration of the
//! call so nested crossings find it.

use crate::callback::CallbackCell;
use crate::descriptor::{self, FunctionalInterface};
use crate::entry::entry;
use crate::kind::{self, Crossing, ValueKind};
use jbridge_runtime::jni::{self, JniEnv};
use jbridge_runtime::{thread, Env, RawObject};
use jni_sys::{jboolean, jclass, jdouble, jint, jlong, jobject, JNIEnv, JavaVM, JNI_VERSION_1_8};
use std::ffi::c_void;
use std::sync::Arc;
use tracing::error;

/// Install the JVM runtime and the bridge configuration
///
/// # Safety
/// `vm` must be the `JavaVM` pointer handed to `JNI_OnLoad`.
pub unsafe fn on_load(vm: *mut JavaVM) {
    crate::init();
    jni::on_load(vm);
}

#[no_mangle]
pub unsafe extern "system" fn JNI_OnLoad(vm: *mut JavaVM, _reserved: *mut c_void) -> jint {
    on_load(vm);
    JNI_VERSION_1_8
}

/// JNI representation of a kind's crossing value
trait JniKind: ValueKind {
    type Raw: Copy;

    fn from_raw(raw: Self::Raw) -> Crossing<Self>;

    fn into_raw(value: Crossing<Self>) -> Self::Raw;
}

impl JniKind for kind::Boolean {
    type Raw = jboolean;

    fn from_raw(raw: jboolean) -> bool {
        raw != 0
    }

    fn into_raw(value: bool) -> jboolean {
        value as jboolean
    }
}

impl JniKind for kind::Object {
    type Raw = jobject;

    fn from_raw(raw: jobject) -> RawObject {
        RawObject::from_ptr(raw as *mut c_void)
    }

    fn into_raw(value: RawObject) -> jobject {
        value.as_ptr() as jobject
    }
}

macro_rules! identity_kind {
    ($($kind:ty => $raw:ty;)*) => {
        $(
            impl JniKind for $kind {
                type Raw = $raw;

                #[inline]
                fn from_raw(raw: $raw) -> $raw {
                    raw
                }

                #[inline]
                fn into_raw(value: $raw) -> $raw {
                    value
                }
            }
        )*
    };
}

identity_kind! {
    kind::Int => jint;
    kind::Long => jlong;
    kind::Double => jdouble;
}

/// Run `f` with the calling thread's handle registered
///
/// # Safety
/// `raw` must be the live `JNIEnv` of the calling thread.
unsafe fn with_env<T>(raw: *mut JNIEnv, default: T, f: impl FnOnce(&dyn Env) -> T) -> T {
    let Some(env) = JniEnv::from_raw(raw) else {
        error!(target: "jvm", "native method called before JNI_OnLoad");
        return default;
    };

    let env: Arc<dyn Env> = Arc::new(env);
    let _guard = thread::attach(env.clone());
    f(&*env)
}

type ArgRaw<S> = <<S as FunctionalInterface>::ArgKind as JniKind>::Raw;
type RetRaw<S> = <<S as FunctionalInterface>::RetKind as JniKind>::Raw;

macro_rules! export {
    ($($symbol:ident => $shape:ident;)*) => {
        $(
            #[no_mangle]
            pub unsafe extern "system" fn $symbol(
                env: *mut JNIEnv,
                this: jobject,
                arg: ArgRaw<descriptor::$shape>,
            ) -> RetRaw<descriptor::$shape> {
                type S = descriptor::$shape;
                type AK = <S as FunctionalInterface>::ArgKind;
                type RK = <S as FunctionalInterface>::RetKind;

                let result = with_env(env, RK::zero(), |env| {
                    entry::<S>(env, kind::Object::from_raw(this), AK::from_raw(arg))
                });
                RK::into_raw(result)
            }
        )*
    };
}

export! {
    Java_io_jbridge_function_NativePredicate_test => Predicate;
    Java_io_jbridge_function_NativeIntPredicate_test => IntPredicate;
    Java_io_jbridge_function_NativeLongPredicate_test => LongPredicate;
    Java_io_jbridge_function_NativeDoublePredicate_test => DoublePredicate;
    Java_io_jbridge_function_NativeFunction_apply => Function;
    Java_io_jbridge_function_NativeIntFunction_apply => IntFunction;
    Java_io_jbridge_function_NativeLongFunction_apply => LongFunction;
    Java_io_jbridge_function_NativeDoubleFunction_apply => DoubleFunction;
    Java_io_jbridge_function_NativeToIntFunction_applyAsInt => ToIntFunction;
    Java_io_jbridge_function_NativeToLongFunction_applyAsLong => ToLongFunction;
    Java_io_jbridge_function_NativeToDoubleFunction_applyAsDouble => ToDoubleFunction;
}

/// `NativeCallback.release(long)`, called once by the wrapper's cleaner
#[no_mangle]
pub unsafe extern "system" fn Java_io_jbridge_function_NativeCallback_release(
    _env: *mut JNIEnv,
    _class: jclass,
    pointer: jlong,
) {
    CallbackCell::release(pointer);
}
