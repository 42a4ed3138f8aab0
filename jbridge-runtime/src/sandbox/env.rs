//! Sandbox execution handle - JNI semantics over the sandbox heap
//!
//! Every method call runs in its own local frame: references created by the
//! body are released when it returns, and an object result is re-issued as a
//! local reference in the caller's frame. Failures leave a throwable pending
//! and return the zero value of the expected type.

use super::builtins::names;
use super::class::{ClassId, ClassKind};
use super::heap::{DeadObject, ObjId, Payload, RefKind};
use super::VmInner;
use crate::env::{Env, Runtime};
use crate::logging::{error, trace, warn};
use crate::value::{FieldId, JValue, JavaType, MethodId, RawObject};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Execution handle for one attached thread
pub struct VmEnv {
    vm: Arc<VmInner>,
    owner: ThreadId,
    frames: Mutex<Vec<Vec<RawObject>>>,
    pending: Mutex<Option<ObjId>>,
}

impl VmEnv {
    pub(crate) fn new(vm: Arc<VmInner>) -> Self {
        Self {
            vm,
            owner: thread::current().id(),
            frames: Mutex::new(vec![Vec::new()]),
            pending: Mutex::new(None),
        }
    }

    /// Thread this handle belongs to
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Current local frame depth (1 outside of any managed call)
    pub fn frame_depth(&self) -> usize {
        self.frames.lock().len()
    }

    /// Slash-separated class name of an object
    pub fn class_name_of(&self, obj: RawObject) -> Option<String> {
        let class = self.class_of(obj)?;
        self.vm.classes.read().get(class).map(|def| def.name.clone())
    }

    /// Name of the class a `java/lang/Class` reference describes
    pub fn mirror_name(&self, class: RawObject) -> Option<String> {
        let class = self.mirrored_class(class)?;
        self.vm.classes.read().get(class).map(|def| def.name.clone())
    }

    /// Throw a new instance of a class looked up by name
    pub fn throw_new_by_name(&self, class: &str, message: &str) {
        self.throw_named(class, Some(message.to_string()));
    }

    /// Message carried by a throwable
    pub fn throwable_message(&self, obj: RawObject) -> Option<String> {
        let id = self.resolve(obj)?;
        match &self.vm.heap.lock().object(id)?.payload {
            Payload::Throwable { message } => message.clone(),
            _ => None,
        }
    }

    // ===== Internals =====

    fn check_thread(&self, op: &'static str) {
        let current = thread::current().id();
        if current != self.owner {
            self.vm.stats.affinity_violation();
            error!(target: "sandbox", op, owner = ?self.owner, ?current, "handle used off its thread");
            assert!(!self.vm.config.strict_crossings, "sandbox handle used off its owner thread in {op}");
        }
    }

    fn check_crossing(&self, op: &'static str) {
        self.check_thread(op);
        if self.exception_check() {
            self.vm.stats.pending_violation();
            error!(target: "sandbox", op, "crossing attempted with an exception pending");
            assert!(!self.vm.config.strict_crossings, "crossing {op} attempted with an exception pending");
        }
    }

    fn resolve(&self, raw: RawObject) -> Option<ObjId> {
        if raw.is_null() {
            return None;
        }
        self.vm.heap.lock().resolve(raw)
    }

    fn class_of(&self, raw: RawObject) -> Option<ClassId> {
        let id = self.resolve(raw)?;
        self.vm.heap.lock().object(id).map(|obj| obj.class)
    }

    /// Class described by a `java/lang/Class` reference
    fn mirrored_class(&self, raw: RawObject) -> Option<ClassId> {
        let id = self.resolve(raw)?;
        match self.vm.heap.lock().object(id)?.payload {
            Payload::Class(class) => Some(class),
            _ => None,
        }
    }

    /// New local reference in the current frame
    fn local(&self, obj: ObjId) -> RawObject {
        let raw = self.vm.heap.lock().new_ref(obj, RefKind::Local);
        let mut frames = self.frames.lock();
        if frames.is_empty() {
            frames.push(Vec::new());
        }
        if let Some(frame) = frames.last_mut() {
            frame.push(raw);
        }
        raw
    }

    fn delete_local(&self, raw: RawObject) -> Option<DeadObject> {
        match self.vm.heap.lock().delete_ref(raw, RefKind::Local) {
            Ok(dead) => dead,
            Err(mismatch) => {
                self.vm.stats.invalid_release();
                warn!(target: "sandbox", ?raw, ?mismatch, "invalid local reference release");
                None
            }
        }
    }

    fn set_pending(&self, obj: ObjId) {
        self.vm.heap.lock().hold(obj);
        let previous = self.pending.lock().replace(obj);
        if let Some(previous) = previous {
            let dead = self.vm.heap.lock().release(previous);
            self.vm.finalize(dead);
        }
    }

    fn throw_named(&self, class: &str, message: Option<String>) {
        let Some(class_id) = self.vm.classes.read().lookup(class).map(|def| def.id) else {
            error!(target: "sandbox", class, "throwable class not defined");
            return;
        };
        self.throw_instance(class_id, message);
    }

    fn throw_instance(&self, class: ClassId, message: Option<String>) {
        trace!(target: "sandbox", class, ?message, "throwing");
        let fields = self.zero_fields(class);
        let obj = self
            .vm
            .heap
            .lock()
            .alloc_unchecked(class, fields, Payload::Throwable { message });
        self.set_pending(obj);
    }

    fn zero_fields(&self, class: ClassId) -> Vec<JValue> {
        self.vm
            .classes
            .read()
            .get(class)
            .map(|def| def.fields.iter().map(|f| JValue::zero(f.ty)).collect())
            .unwrap_or_default()
    }

    fn push_frame(&self) {
        self.frames.lock().push(Vec::new());
    }

    /// Leave a call frame, carrying an object result into the caller's frame
    fn pop_frame(&self, result: JValue) -> JValue {
        let frame = self.frames.lock().pop().unwrap_or_default();

        let result = match result {
            JValue::Object(raw) if !raw.is_null() => match self.resolve(raw) {
                Some(obj) => JValue::Object(self.local(obj)),
                None => {
                    warn!(target: "sandbox", ?raw, "method returned a dead reference");
                    JValue::Object(RawObject::null())
                }
            },
            other => other,
        };

        let dead: Vec<_> = {
            let mut heap = self.vm.heap.lock();
            frame
                .into_iter()
                .filter_map(|raw| heap.delete_ref(raw, RefKind::Local).ok().flatten())
                .collect()
        };
        self.vm.finalize_all(dead);
        result
    }

    /// Release every frame and the pending exception (thread detach)
    pub(crate) fn release_all(&self) {
        let frames = std::mem::take(&mut *self.frames.lock());
        let pending = self.pending.lock().take();

        let dead: Vec<_> = {
            let mut heap = self.vm.heap.lock();
            let mut dead: Vec<_> = frames
                .into_iter()
                .flatten()
                .filter_map(|raw| heap.delete_ref(raw, RefKind::Local).ok().flatten())
                .collect();
            dead.extend(pending.and_then(|obj| heap.release(obj)));
            dead
        };
        self.vm.finalize_all(dead);
    }

    fn call(&self, obj: RawObject, method: MethodId, args: &[JValue], expected: JavaType) -> JValue {
        self.check_crossing("call");
        let zero = JValue::zero(expected);

        let Some(key) = self.vm.method_key(method) else {
            self.throw_named(names::NO_SUCH_METHOD_ERROR, Some("invalid method id".into()));
            return zero;
        };
        debug_assert_eq!(key.ret, expected, "{}{} called through the wrong typed call", key.name, key.sig);
        debug_assert_eq!(key.params, args.len(), "{}{} called with the wrong arity", key.name, key.sig);

        let Some(receiver) = self.resolve(obj) else {
            self.throw_named(names::NULL_POINTER_EXCEPTION, Some(format!("{}{}", key.name, key.sig)));
            return zero;
        };
        let Some(class) = self.vm.heap.lock().object(receiver).map(|o| o.class) else {
            return zero;
        };

        let body = self.vm.classes.read().find_body(class, &key.name, &key.sig);
        let Some(body) = body else {
            let owner = self.class_name_of(obj).unwrap_or_default();
            self.throw_named(
                names::ABSTRACT_METHOD_ERROR,
                Some(format!("{owner}.{}{}", key.name, key.sig)),
            );
            return zero;
        };

        self.push_frame();
        let this = self.local(receiver);
        let result = body(self, this, args);
        let result = self.pop_frame(result);

        if self.exception_check() || result.java_type() != expected {
            if !self.exception_check() {
                warn!(target: "sandbox", method = %key.name, ?result, "method body returned the wrong type");
            }
            if let JValue::Object(raw) = result {
                self.delete_local_ref(raw);
            }
            return zero;
        }
        result
    }
}

impl Env for VmEnv {
    fn runtime(&self) -> Arc<dyn Runtime> {
        self.vm.clone()
    }

    fn find_class(&self, path: &str) -> RawObject {
        self.check_crossing("find_class");
        let mirror = self.vm.classes.read().lookup(path).map(|def| def.mirror);
        match mirror {
            Some(mirror) => self.local(mirror),
            None => {
                self.throw_named(names::NO_CLASS_DEF_FOUND_ERROR, Some(path.to_string()));
                RawObject::null()
            }
        }
    }

    fn get_object_class(&self, obj: RawObject) -> RawObject {
        self.check_crossing("get_object_class");
        let mirror = self
            .class_of(obj)
            .and_then(|class| self.vm.classes.read().get(class).map(|def| def.mirror));
        mirror.map_or(RawObject::null(), |mirror| self.local(mirror))
    }

    fn get_method_id(&self, class: RawObject, name: &str, sig: &str) -> MethodId {
        self.check_crossing("get_method_id");
        let found = self.mirrored_class(class).and_then(|class| {
            let classes = self.vm.classes.read();
            let method = classes
                .find_method(class, name, sig)
                .map(|m| (m.name.clone(), m.sig.clone(), m.ret));
            method
        });

        match found {
            Some((name, sig, ret)) => self.vm.intern_method(name, sig, ret),
            None => {
                self.throw_named(names::NO_SUCH_METHOD_ERROR, Some(format!("{name}{sig}")));
                MethodId::null()
            }
        }
    }

    fn get_field_id(&self, class: RawObject, name: &str, sig: &str) -> FieldId {
        self.check_crossing("get_field_id");
        let found = self.mirrored_class(class).and_then(|class| {
            self.vm
                .classes
                .read()
                .find_field(class, name, sig)
                .map(|(slot, ty)| (class, slot, ty))
        });

        match found {
            Some((class, slot, ty)) => self.vm.intern_field(class, slot, ty),
            None => {
                self.throw_named(names::NO_SUCH_FIELD_ERROR, Some(name.to_string()));
                FieldId::null()
            }
        }
    }

    fn alloc_object(&self, class: RawObject) -> RawObject {
        self.check_crossing("alloc_object");
        let Some(class) = self.mirrored_class(class) else {
            self.throw_named(names::INSTANTIATION_EXCEPTION, None);
            return RawObject::null();
        };

        let (kind, name, payload) = {
            let classes = self.vm.classes.read();
            let Some(def) = classes.get(class) else {
                return RawObject::null();
            };
            let throwable = classes
                .lookup(names::THROWABLE)
                .is_some_and(|t| classes.is_subclass(class, t.id));
            let payload = if throwable {
                Payload::Throwable { message: None }
            } else if def.name == names::STRING {
                Payload::Str(String::new())
            } else {
                Payload::None
            };
            (def.kind, def.name.clone(), payload)
        };

        if kind != ClassKind::Concrete {
            self.throw_named(names::INSTANTIATION_EXCEPTION, Some(name));
            return RawObject::null();
        }

        let fields = self.zero_fields(class);
        let allocated = self.vm.heap.lock().alloc(class, fields, payload);
        match allocated {
            Some(obj) => self.local(obj),
            None => {
                self.throw_named(names::OUT_OF_MEMORY_ERROR, Some("sandbox heap limit reached".into()));
                RawObject::null()
            }
        }
    }

    fn get_long_field(&self, obj: RawObject, field: FieldId) -> i64 {
        self.check_thread("get_long_field");
        let (Some(key), Some(id)) = (self.vm.field_key(field), self.resolve(obj)) else {
            return 0;
        };
        let heap = self.vm.heap.lock();
        heap.object(id)
            .and_then(|o| o.fields.get(key.slot))
            .and_then(JValue::as_long)
            .unwrap_or(0)
    }

    fn set_long_field(&self, obj: RawObject, field: FieldId, value: i64) {
        self.check_thread("set_long_field");
        let (Some(key), Some(id)) = (self.vm.field_key(field), self.resolve(obj)) else {
            return;
        };
        debug_assert_eq!(key.ty, JavaType::Long);
        let mut heap = self.vm.heap.lock();
        if let Some(slot) = heap.object_mut(id).and_then(|o| o.fields.get_mut(key.slot)) {
            *slot = JValue::Long(value);
        }
    }

    fn call_void_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) {
        self.call(obj, method, args, JavaType::Void);
    }

    fn call_boolean_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> bool {
        self.call(obj, method, args, JavaType::Boolean)
            .as_bool()
            .unwrap_or(false)
    }

    fn call_int_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> i32 {
        self.call(obj, method, args, JavaType::Int).as_int().unwrap_or(0)
    }

    fn call_long_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> i64 {
        self.call(obj, method, args, JavaType::Long).as_long().unwrap_or(0)
    }

    fn call_double_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> f64 {
        self.call(obj, method, args, JavaType::Double)
            .as_double()
            .unwrap_or(0.0)
    }

    fn call_object_method(&self, obj: RawObject, method: MethodId, args: &[JValue]) -> RawObject {
        self.call(obj, method, args, JavaType::Object)
            .as_object()
            .unwrap_or_default()
    }

    fn new_string_utf(&self, value: &str) -> RawObject {
        self.check_crossing("new_string_utf");
        let Some(class) = self.vm.classes.read().lookup(names::STRING).map(|def| def.id) else {
            return RawObject::null();
        };
        let allocated = self
            .vm
            .heap
            .lock()
            .alloc(class, Vec::new(), Payload::Str(value.to_string()));
        match allocated {
            Some(obj) => self.local(obj),
            None => {
                self.throw_named(names::OUT_OF_MEMORY_ERROR, Some("sandbox heap limit reached".into()));
                RawObject::null()
            }
        }
    }

    fn get_string_utf(&self, obj: RawObject) -> Option<String> {
        self.check_thread("get_string_utf");
        let id = self.resolve(obj)?;
        match &self.vm.heap.lock().object(id)?.payload {
            Payload::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn new_local_ref(&self, obj: RawObject) -> RawObject {
        self.check_thread("new_local_ref");
        self.resolve(obj).map_or(RawObject::null(), |id| self.local(id))
    }

    fn delete_local_ref(&self, obj: RawObject) {
        self.check_thread("delete_local_ref");
        if obj.is_null() {
            return;
        }

        {
            let mut frames = self.frames.lock();
            let position = frames
                .iter()
                .enumerate()
                .rev()
                .find_map(|(depth, frame)| frame.iter().rposition(|r| *r == obj).map(|i| (depth, i)));
            if let Some((depth, index)) = position {
                frames[depth].swap_remove(index);
            }
        }

        let dead = self.delete_local(obj);
        self.vm.finalize(dead);
    }

    fn new_global_ref(&self, obj: RawObject) -> RawObject {
        self.check_thread("new_global_ref");
        match self.resolve(obj) {
            Some(id) => {
                let mut heap = self.vm.heap.lock();
                if self.vm.config.max_global_refs.is_some_and(|max| heap.global_refs() >= max) {
                    warn!(target: "sandbox", ?obj, "global reference table full");
                    return RawObject::null();
                }
                heap.new_ref(id, RefKind::Global)
            }
            None => RawObject::null(),
        }
    }

    fn delete_global_ref(&self, obj: RawObject) {
        Runtime::delete_global_ref(&*self.vm, obj);
    }

    fn is_same_object(&self, a: RawObject, b: RawObject) -> bool {
        self.resolve(a) == self.resolve(b)
    }

    fn exception_check(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn exception_occurred(&self) -> RawObject {
        let pending = *self.pending.lock();
        pending.map_or(RawObject::null(), |obj| self.local(obj))
    }

    fn exception_clear(&self) {
        let pending = self.pending.lock().take();
        if let Some(obj) = pending {
            let dead = self.vm.heap.lock().release(obj);
            self.vm.finalize(dead);
        }
    }

    fn throw(&self, throwable: RawObject) {
        self.check_thread("throw");
        if let Some(obj) = self.resolve(throwable) {
            self.set_pending(obj);
        }
    }

    fn throw_new(&self, class: RawObject, message: &str) {
        self.check_thread("throw_new");
        match self.mirrored_class(class) {
            Some(class) => self.throw_instance(class, Some(message.to_string())),
            None => self.throw_named(names::NO_CLASS_DEF_FOUND_ERROR, Some(message.to_string())),
        }
    }
}

impl fmt::Debug for VmEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmEnv")
            .field("owner", &self.owner)
            .field("frames", &self.frame_depth())
            .field("pending", &self.exception_check())
            .finish()
    }
}
