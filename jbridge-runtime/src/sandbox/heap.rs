//! Sandbox heap - objects plus a reference table
//!
//! Every handle given out (local or global) is an entry in the reference
//! table and holds one count on its object. Internal holds (the pending
//! exception) count the same way. An object whose count drops to zero is
//! reclaimed at once and reported back so its class cleanup hook can run
//! outside the heap lock.

use super::class::ClassId;
use crate::value::{JValue, RawObject};
use slab::Slab;

/// Encoded handles are 8-byte aligned non-null values
const HANDLE_SHIFT: u32 = 3;

pub(crate) type ObjId = usize;

/// Object payload for the classes the sandbox knows natively
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    None,
    Str(String),
    Class(ClassId),
    Throwable { message: Option<String> },
}

pub(crate) struct HeapObject {
    pub class: ClassId,
    pub fields: Vec<JValue>,
    pub payload: Payload,
    holds: u32,
    pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Local,
    Global,
}

struct RefEntry {
    object: ObjId,
    kind: RefKind,
}

/// Object reclaimed by the last release of a reference
pub(crate) struct DeadObject {
    pub class: ClassId,
    pub fields: Vec<JValue>,
}

pub(crate) struct Heap {
    objects: Slab<HeapObject>,
    refs: Slab<RefEntry>,
    pinned: usize,
    local_refs: usize,
    global_refs: usize,
    reclaimed: usize,
    max_objects: Option<usize>,
}

impl Heap {
    pub fn new(max_objects: Option<usize>) -> Self {
        Self {
            objects: Slab::with_capacity(256),
            refs: Slab::with_capacity(256),
            pinned: 0,
            local_refs: 0,
            global_refs: 0,
            reclaimed: 0,
            max_objects,
        }
    }

    /// Allocate an object, honouring the heap limit
    pub fn alloc(&mut self, class: ClassId, fields: Vec<JValue>, payload: Payload) -> Option<ObjId> {
        if let Some(max) = self.max_objects {
            if self.live_objects() >= max {
                return None;
            }
        }
        Some(self.alloc_unchecked(class, fields, payload))
    }

    /// Allocate ignoring the limit (throwables describing the failure itself)
    pub fn alloc_unchecked(&mut self, class: ClassId, fields: Vec<JValue>, payload: Payload) -> ObjId {
        self.objects.insert(HeapObject {
            class,
            fields,
            payload,
            holds: 0,
            pinned: false,
        })
    }

    /// Allocate an object that is never reclaimed (class mirrors)
    pub fn alloc_pinned(&mut self, class: ClassId, payload: Payload) -> ObjId {
        let id = self.alloc_unchecked(class, Vec::new(), payload);
        self.objects[id].pinned = true;
        self.pinned += 1;
        id
    }

    pub fn object(&self, id: ObjId) -> Option<&HeapObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjId) -> Option<&mut HeapObject> {
        self.objects.get_mut(id)
    }

    /// Hand out a new reference to a live object
    pub fn new_ref(&mut self, object: ObjId, kind: RefKind) -> RawObject {
        debug_assert!(self.objects.contains(object), "reference to reclaimed object");

        self.objects[object].holds += 1;
        match kind {
            RefKind::Local => self.local_refs += 1,
            RefKind::Global => self.global_refs += 1,
        }

        let index = self.refs.insert(RefEntry { object, kind });
        encode(index)
    }

    /// Object behind a live reference
    pub fn resolve(&self, raw: RawObject) -> Option<ObjId> {
        let index = decode(raw)?;
        self.refs.get(index).map(|entry| entry.object)
    }

    pub fn ref_kind(&self, raw: RawObject) -> Option<RefKind> {
        let index = decode(raw)?;
        self.refs.get(index).map(|entry| entry.kind)
    }

    /// Delete a reference; returns the object if this reclaimed it
    pub fn delete_ref(&mut self, raw: RawObject, kind: RefKind) -> Result<Option<DeadObject>, RefMismatch> {
        let index = decode(raw).ok_or(RefMismatch::Invalid)?;
        match self.refs.get(index) {
            None => return Err(RefMismatch::Invalid),
            Some(entry) if entry.kind != kind => return Err(RefMismatch::WrongKind(entry.kind)),
            Some(_) => {}
        }

        let entry = self.refs.remove(index);
        match kind {
            RefKind::Local => self.local_refs -= 1,
            RefKind::Global => self.global_refs -= 1,
        }
        Ok(self.release(entry.object))
    }

    /// Add an internal hold on an object
    pub fn hold(&mut self, object: ObjId) {
        if let Some(obj) = self.objects.get_mut(object) {
            obj.holds += 1;
        }
    }

    /// Drop one hold; reclaims the object when none are left
    pub fn release(&mut self, object: ObjId) -> Option<DeadObject> {
        let obj = self.objects.get_mut(object)?;
        debug_assert!(obj.holds > 0, "hold count underflow");
        obj.holds = obj.holds.saturating_sub(1);

        if obj.holds > 0 || obj.pinned {
            return None;
        }

        let obj = self.objects.remove(object);
        self.reclaimed += 1;
        Some(DeadObject {
            class: obj.class,
            fields: obj.fields,
        })
    }

    /// Unpinned objects currently alive
    pub fn live_objects(&self) -> usize {
        self.objects.len() - self.pinned
    }

    pub fn local_refs(&self) -> usize {
        self.local_refs
    }

    pub fn global_refs(&self) -> usize {
        self.global_refs
    }

    pub fn reclaimed(&self) -> usize {
        self.reclaimed
    }
}

/// Reference deleted through the wrong operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefMismatch {
    Invalid,
    WrongKind(RefKind),
}

#[inline]
fn encode(index: usize) -> RawObject {
    RawObject::from_ptr(((index + 1) << HANDLE_SHIFT) as *mut core::ffi::c_void)
}

#[inline]
fn decode(raw: RawObject) -> Option<usize> {
    let bits = raw.as_ptr() as usize;
    if bits == 0 || bits & ((1 << HANDLE_SHIFT) - 1) != 0 {
        return None;
    }
    Some((bits >> HANDLE_SHIFT) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_encoding() {
        for index in [0usize, 1, 7, 1024] {
            assert_eq!(decode(encode(index)), Some(index));
        }
        assert_eq!(decode(RawObject::null()), None);
        assert_eq!(decode(RawObject::from_ptr(0x13 as *mut _)), None);
    }

    #[test]
    fn test_last_reference_reclaims() {
        let mut heap = Heap::new(None);
        let obj = heap.alloc(3, vec![JValue::Long(42)], Payload::None).unwrap();

        let local = heap.new_ref(obj, RefKind::Local);
        let global = heap.new_ref(obj, RefKind::Global);
        assert_eq!(heap.local_refs(), 1);
        assert_eq!(heap.global_refs(), 1);

        assert!(heap.delete_ref(local, RefKind::Local).unwrap().is_none());
        let dead = heap.delete_ref(global, RefKind::Global).unwrap().unwrap();
        assert_eq!(dead.class, 3);
        assert_eq!(dead.fields, vec![JValue::Long(42)]);
        assert_eq!(heap.live_objects(), 0);
        assert_eq!(heap.reclaimed(), 1);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mut heap = Heap::new(None);
        let obj = heap.alloc(0, Vec::new(), Payload::None).unwrap();
        let local = heap.new_ref(obj, RefKind::Local);

        assert_eq!(
            heap.delete_ref(local, RefKind::Global).err(),
            Some(RefMismatch::WrongKind(RefKind::Local))
        );
        assert!(heap.delete_ref(local, RefKind::Local).is_ok());
        assert_eq!(heap.delete_ref(local, RefKind::Local).err(), Some(RefMismatch::Invalid));
    }

    #[test]
    fn test_limit_and_pinning() {
        let mut heap = Heap::new(Some(1));
        heap.alloc_pinned(1, Payload::Class(0));
        assert!(heap.alloc(0, Vec::new(), Payload::None).is_some());
        assert!(heap.alloc(0, Vec::new(), Payload::None).is_none());
        heap.alloc_unchecked(0, Vec::new(), Payload::None);
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_internal_hold_keeps_object() {
        let mut heap = Heap::new(None);
        let obj = heap.alloc(0, Vec::new(), Payload::None).unwrap();
        let local = heap.new_ref(obj, RefKind::Local);

        heap.hold(obj);
        assert!(heap.delete_ref(local, RefKind::Local).unwrap().is_none());
        assert!(heap.release(obj).is_some());
    }
}
