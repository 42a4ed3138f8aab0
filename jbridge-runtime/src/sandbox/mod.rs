//! Sandbox runtime - an in-process managed runtime with JNI semantics
//!
//! Design: Classes carry Rust closures as method bodies, objects live in a
//! reference-counted heap, and each attached thread gets its own `VmEnv`
//! with local frames and a pending-exception slot. It exists so the bridge
//! can be driven end to end (and leak-checked) without a JVM.
//!
//! Locking: the class table is always taken before the heap, and no lock is
//! held while a method body or cleanup hook runs.

mod builtins;
mod class;
mod env;
mod heap;


pub use builtins::names;
pub use class::{ClassBuilder, ClassKind, CleanupHook, FinalizedObject, MethodBody};
pub use env::VmEnv;
pub use crate::error::SandboxError;

use crate::env::Runtime;
use crate::logging::{debug, warn};
use crate::thread::{self, AttachGuard};
use crate::value::{FieldId, JavaType, MethodId, RawObject};
use class::{ClassId, ClassTable};
use heap::{DeadObject, Heap, Payload, RefKind};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Sandbox construction options
#[derive(Debug, Clone, Default)]
pub struct VmConfig {
    /// Upper bound on live objects (allocation beyond throws OutOfMemoryError)
    pub max_objects: Option<usize>,
    /// Upper bound on global references (beyond, `new_global_ref` returns null)
    pub max_global_refs: Option<usize>,
    /// Panic on handle misuse instead of only counting it
    pub strict_crossings: bool,
}

#[derive(Debug, Default)]
pub struct VmBuilder {
    config: VmConfig,
}

impl VmBuilder {
    pub fn max_objects(mut self, max: usize) -> Self {
        self.config.max_objects = Some(max);
        self
    }

    pub fn max_global_refs(mut self, max: usize) -> Self {
        self.config.max_global_refs = Some(max);
        self
    }

    pub fn strict_crossings(mut self, strict: bool) -> Self {
        self.config.strict_crossings = strict;
        self
    }

    pub fn build(self) -> Result<Vm, SandboxError> {
        Vm::with_config(self.config)
    }
}

/// Heap and misuse counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_objects: usize,
    pub local_refs: usize,
    pub global_refs: usize,
    pub reclaimed: usize,
    /// Releases of unknown references or through the wrong operation
    pub invalid_releases: usize,
    /// Crossings attempted while an exception was pending
    pub pending_violations: usize,
    /// Handles used on a thread other than their owner
    pub affinity_violations: usize,
}

#[derive(Default)]
pub(crate) struct Counters {
    invalid_releases: AtomicUsize,
    pending_violations: AtomicUsize,
    affinity_violations: AtomicUsize,
    hooks_run: AtomicUsize,
}

impl Counters {
    pub fn invalid_release(&self) {
        self.invalid_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_violation(&self) {
        self.pending_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn affinity_violation(&self) {
        self.affinity_violations.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) struct MethodKey {
    pub name: String,
    pub sig: String,
    pub ret: JavaType,
    pub params: usize,
}

pub(crate) struct FieldKey {
    pub slot: usize,
    pub ty: JavaType,
}

pub(crate) struct VmInner {
    pub classes: RwLock<ClassTable>,
    pub heap: Mutex<Heap>,
    pub config: VmConfig,
    pub stats: Counters,
    methods: RwLock<Vec<MethodKey>>,
    fields: RwLock<Vec<(ClassId, FieldKey)>>,
}

impl VmInner {
    /// Method ids are 1-based indices into the method table
    pub fn intern_method(&self, name: String, sig: String, ret: JavaType) -> MethodId {
        let existing = self
            .methods
            .read()
            .iter()
            .position(|key| key.name == name && key.sig == sig);
        let index = match existing {
            Some(index) => index,
            None => {
                let params = crate::value::MethodSignature::parse(&sig).map_or(0, |s| s.params.len());
                let mut methods = self.methods.write();
                methods.push(MethodKey { name, sig, ret, params });
                methods.len() - 1
            }
        };
        MethodId::from_ptr((index + 1) as *mut core::ffi::c_void)
    }

    pub fn method_key(&self, method: MethodId) -> Option<MethodKey> {
        let index = (method.as_ptr() as usize).checked_sub(1)?;
        self.methods.read().get(index).map(|key| MethodKey {
            name: key.name.clone(),
            sig: key.sig.clone(),
            ret: key.ret,
            params: key.params,
        })
    }

    pub fn intern_field(&self, class: ClassId, slot: usize, ty: JavaType) -> FieldId {
        let existing = self
            .fields
            .read()
            .iter()
            .position(|(owner, key)| *owner == class && key.slot == slot);
        let index = match existing {
            Some(index) => index,
            None => {
                let mut fields = self.fields.write();
                fields.push((class, FieldKey { slot, ty }));
                fields.len() - 1
            }
        };
        FieldId::from_ptr((index + 1) as *mut core::ffi::c_void)
    }

    pub fn field_key(&self, field: FieldId) -> Option<FieldKey> {
        let index = (field.as_ptr() as usize).checked_sub(1)?;
        self.fields
            .read()
            .get(index)
            .map(|(_, key)| FieldKey { slot: key.slot, ty: key.ty })
    }

    /// Run the cleanup hook of a reclaimed object (no locks held)
    pub fn finalize(&self, dead: Option<DeadObject>) {
        let Some(dead) = dead else {
            return;
        };

        let (hook, snapshot) = {
            let classes = self.classes.read();
            match classes.cleanup_hook(dead.class) {
                Some(hook) => (hook, classes.finalized(dead.class, dead.fields)),
                None => return,
            }
        };

        self.stats.hooks_run.fetch_add(1, Ordering::Relaxed);
        hook(&snapshot);
    }

    pub fn finalize_all(&self, dead: Vec<DeadObject>) {
        for object in dead {
            self.finalize(Some(object));
        }
    }
}

impl Runtime for VmInner {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn delete_global_ref(&self, obj: RawObject) {
        if obj.is_null() {
            return;
        }

        let released = self.heap.lock().delete_ref(obj, RefKind::Global);
        match released {
            Ok(dead) => self.finalize(dead),
            Err(mismatch) => {
                self.stats.invalid_release();
                warn!(target: "sandbox", ?obj, ?mismatch, "invalid global reference release");
            }
        }
    }
}

/// Handle to a sandbox runtime (cheap to clone)
#[derive(Clone)]
pub struct Vm {
    inner: Arc<VmInner>,
}

impl Vm {
    /// Sandbox with default options and the builtin classes
    pub fn new() -> Result<Self, SandboxError> {
        Self::with_config(VmConfig::default())
    }

    pub fn builder() -> VmBuilder {
        VmBuilder::default()
    }

    pub fn with_config(config: VmConfig) -> Result<Self, SandboxError> {
        let heap = Heap::new(config.max_objects);
        let vm = Self {
            inner: Arc::new(VmInner {
                classes: RwLock::new(ClassTable::default()),
                heap: Mutex::new(heap),
                config,
                stats: Counters::default(),
                methods: RwLock::new(Vec::new()),
                fields: RwLock::new(Vec::new()),
            }),
        };
        builtins::install(&vm)?;
        debug!(target: "sandbox", classes = vm.class_count(), "sandbox runtime created");
        Ok(vm)
    }

    /// Define a class; its superclass and interfaces must already exist
    pub fn define_class(&self, builder: ClassBuilder) -> Result<(), SandboxError> {
        let mut classes = self.inner.classes.write();
        let mut def = classes.prepare(builder, 0)?;
        def.mirror = self
            .inner
            .heap
            .lock()
            .alloc_pinned(builtins::CLASS_CLASS_ID, Payload::Class(def.id));
        let def = classes.insert(def);
        debug!(target: "sandbox", class = %def.name, id = def.id, "class defined");
        Ok(())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.inner.classes.read().lookup(name).is_some()
    }

    pub fn class_count(&self) -> usize {
        self.inner.classes.read().next_id()
    }

    /// Attach the calling thread; the handle is registered until the guard drops
    pub fn attach_current_thread(&self) -> ThreadAttachment {
        let env = Arc::new(VmEnv::new(self.inner.clone()));
        let guard = thread::attach(env.clone());
        ThreadAttachment { env, _guard: guard }
    }

    pub fn runtime(&self) -> Arc<dyn Runtime> {
        self.inner.clone()
    }

    pub fn config(&self) -> &VmConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> HeapStats {
        let heap = self.inner.heap.lock();
        let counters = &self.inner.stats;
        HeapStats {
            live_objects: heap.live_objects(),
            local_refs: heap.local_refs(),
            global_refs: heap.global_refs(),
            reclaimed: heap.reclaimed(),
            invalid_releases: counters.invalid_releases.load(Ordering::Relaxed),
            pending_violations: counters.pending_violations.load(Ordering::Relaxed),
            affinity_violations: counters.affinity_violations.load(Ordering::Relaxed),
        }
    }

    /// Number of cleanup hooks run so far
    pub fn hooks_run(&self) -> usize {
        self.inner.stats.hooks_run.load(Ordering::Relaxed)
    }

    /// Whether `raw` is currently a global reference
    pub fn is_global(&self, raw: RawObject) -> bool {
        self.inner.heap.lock().ref_kind(raw) == Some(RefKind::Global)
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("classes", &self.class_count())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Calling thread's attachment to a sandbox
///
/// Dropping it releases the thread's remaining local references and any
/// pending exception, then unregisters the handle.
pub struct ThreadAttachment {
    env: Arc<VmEnv>,
    _guard: AttachGuard,
}

impl ThreadAttachment {
    pub fn env(&self) -> &VmEnv {
        &self.env
    }

    pub fn shared(&self) -> Arc<VmEnv> {
        self.env.clone()
    }
}

impl Drop for ThreadAttachment {
    fn drop(&mut self) {
        self.env.release_all();
    }
}

impl std::ops::Deref for ThreadAttachment {
    type Target = VmEnv;

    fn deref(&self) -> &VmEnv {
        &self.env
    }
}
