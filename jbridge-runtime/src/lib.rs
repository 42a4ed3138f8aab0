//! jbridge runtime - execution handles, references and managed runtimes
//!
//! This crate is the boundary layer the bridge is written against: the
//! JNI-shaped `Env` surface, scoped references, the per-thread handle
//! registry, and two runtimes implementing it (an in-process sandbox and,
//! with the `jvm` feature, a real JVM).

pub mod env;
pub mod error;
pub mod logging;
pub mod reference;
pub mod sandbox;
pub mod thread;
pub mod value;

#[cfg(feature = "jvm")]
pub mod jni;

// Re-export core types
pub use env::{Env, Runtime};
pub use error::{AttachError, SandboxError};
pub use reference::{GlobalRef, LocalRef};
pub use sandbox::{ClassBuilder, HeapStats, ThreadAttachment, Vm, VmEnv};
pub use value::{FieldId, JValue, JavaType, MethodId, MethodSignature, RawObject};

/// Runtime initialization (logging from the environment)
pub fn init() {
    logging::init();
}
