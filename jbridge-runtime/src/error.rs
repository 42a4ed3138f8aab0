//! Runtime boundary errors

use std::thread::ThreadId;
use thiserror::Error;

/// Failure to obtain an execution handle for the calling thread
///
/// This is a consistency failure: the thread was never attached to the
/// managed runtime, or it was detached while native code still ran on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("thread {thread:?} is not attached to a managed runtime")]
    NotAttached { thread: ThreadId },

    #[error("managed runtime refused to provide a handle for thread {thread:?} (code {code})")]
    Refused { thread: ThreadId, code: i32 },

    /// The thread has handles, but none on the runtime the caller needs
    #[error("thread {thread:?} has no handle on the {runtime} runtime that owns the reference")]
    OtherRuntime { thread: ThreadId, runtime: String },
}

impl AttachError {
    pub fn thread(&self) -> ThreadId {
        match self {
            Self::NotAttached { thread }
            | Self::Refused { thread, .. }
            | Self::OtherRuntime { thread, .. } => *thread,
        }
    }
}

/// Rejected sandbox class definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("class {0} is already defined")]
    DuplicateClass(String),

    #[error("superclass {superclass} of {class} is not a defined class")]
    UnknownSuperclass { class: String, superclass: String },

    #[error("interface {interface} of {class} is not a defined interface")]
    UnknownInterface { class: String, interface: String },

    #[error("invalid signature {sig:?} for {class}.{member}")]
    InvalidSignature {
        class: String,
        member: String,
        sig: String,
    },

    #[error("concrete class {class} declares abstract method {method}")]
    AbstractInConcrete { class: String, method: String },
}
