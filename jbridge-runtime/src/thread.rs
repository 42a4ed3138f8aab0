//! Execution handle provider - per-thread registry of attached handles
//!
//! Design: A process-wide concurrent map from thread identity to a stack of
//! handles. Attaching pushes and returns an RAII guard that pops, so nested
//! entries from managed code (re-entrant crossings) restore the outer
//! handle when they unwind. Lookups never hand a handle to a thread other
//! than the one that attached it.
//!
//! A fallback provider (the JVM's `GetEnv`) can be installed once for
//! threads that entered native code without going through `attach`.

use crate::env::{same_runtime, Env, Runtime};
use crate::error::AttachError;
use crate::logging::{debug, trace};
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Global handle registry (lock-free concurrent map)
static HANDLES: Lazy<HandleRegistry> = Lazy::new(HandleRegistry::new);

/// Provider consulted when the registry has no entry for a thread
static FALLBACK: OnceCell<Box<dyn HandleProvider>> = OnceCell::new();

/// Source of execution handles for threads the registry does not know
pub trait HandleProvider: Send + Sync {
    fn current(&self) -> Result<Arc<dyn Env>, AttachError>;
}

struct HandleRegistry {
    threads: DashMap<ThreadId, Vec<Arc<dyn Env>>>,
}

impl HandleRegistry {
    fn new() -> Self {
        Self {
            threads: DashMap::with_capacity(16),
        }
    }

    fn push(&self, thread: ThreadId, env: Arc<dyn Env>) -> usize {
        let mut stack = self.threads.entry(thread).or_default();
        stack.push(env);
        stack.len()
    }

    fn pop(&self, thread: ThreadId) -> usize {
        let remaining = match self.threads.get_mut(&thread) {
            Some(mut stack) => {
                stack.pop();
                stack.len()
            }
            None => return 0,
        };

        if remaining == 0 {
            self.threads.remove_if(&thread, |_, stack| stack.is_empty());
        }
        remaining
    }

    fn top(&self, thread: ThreadId) -> Option<Arc<dyn Env>> {
        self.threads
            .get(&thread)
            .and_then(|stack| stack.last().cloned())
    }

    /// Innermost handle on `runtime`
    fn find(&self, thread: ThreadId, runtime: &Arc<dyn Runtime>) -> Option<Arc<dyn Env>> {
        self.threads.get(&thread).and_then(|stack| {
            stack
                .iter()
                .rev()
                .find(|env| same_runtime(&env.runtime(), runtime))
                .cloned()
        })
    }

    fn depth(&self, thread: ThreadId) -> usize {
        self.threads.get(&thread).map_or(0, |stack| stack.len())
    }
}

/// Attach a handle to the calling thread until the guard drops
pub fn attach(env: Arc<dyn Env>) -> AttachGuard {
    let thread = thread::current().id();
    let depth = HANDLES.push(thread, env);
    trace!(target: "thread", ?thread, depth, "execution handle attached");

    AttachGuard {
        thread,
        _not_send: PhantomData,
    }
}

/// Handle for the calling thread
///
/// Re-acquire this on every crossing: a handle captured earlier may belong
/// to another thread or to a call frame that has already returned.
pub fn current_env() -> Result<Arc<dyn Env>, AttachError> {
    let thread = thread::current().id();
    if let Some(env) = HANDLES.top(thread) {
        return Ok(env);
    }

    match FALLBACK.get() {
        Some(provider) => provider.current(),
        None => Err(AttachError::NotAttached { thread }),
    }
}

/// Handle for the calling thread on `runtime`
///
/// References and method ids belong to one runtime; a thread attached to
/// several runtimes gets the innermost handle on the right one.
pub fn current_env_for(runtime: &Arc<dyn Runtime>) -> Result<Arc<dyn Env>, AttachError> {
    let thread = thread::current().id();
    if let Some(env) = HANDLES.find(thread, runtime) {
        return Ok(env);
    }

    let attached_elsewhere = HANDLES.depth(thread) > 0;
    match FALLBACK.get().map(|provider| provider.current()) {
        Some(Ok(env)) if same_runtime(&env.runtime(), runtime) => Ok(env),
        Some(Err(error)) if !attached_elsewhere => Err(error),
        None if !attached_elsewhere => Err(AttachError::NotAttached { thread }),
        _ => Err(AttachError::OtherRuntime {
            thread,
            runtime: runtime.name().to_string(),
        }),
    }
}

/// Check whether the calling thread has a registered handle
pub fn is_attached() -> bool {
    HANDLES.depth(thread::current().id()) > 0
}

/// Nesting depth of attachments on the calling thread
pub fn attach_depth() -> usize {
    HANDLES.depth(thread::current().id())
}

/// Install the process-wide fallback provider (first call wins)
///
/// Returns `false` if a provider was already installed.
pub fn install_provider(provider: Box<dyn HandleProvider>) -> bool {
    let installed = FALLBACK.set(provider).is_ok();
    debug!(target: "thread", installed, "fallback handle provider");
    installed
}

/// RAII guard for a thread attachment
///
/// Not `Send`: it must be dropped on the thread that attached.
#[must_use = "the handle is detached as soon as the guard is dropped"]
pub struct AttachGuard {
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl AttachGuard {
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let remaining = HANDLES.pop(self.thread);
        trace!(target: "thread", thread = ?self.thread, remaining, "execution handle detached");
    }
}
