//! Sandbox classes - definitions, method bodies and member resolution
//!
//! Classes are immutable once defined. Superclasses and interfaces must be
//! defined first, so the hierarchy is acyclic by construction.

use super::env::VmEnv;
use super::SandboxError;
use crate::value::{JValue, JavaType, MethodSignature, RawObject};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type ClassId = usize;

/// Managed method implementation: `(env, this, args) -> result`
///
/// `this` and object arguments are local references valid for the call.
/// An object result must be a reference the body owns or received; the
/// caller gets a fresh local reference to it.
pub type MethodBody = Arc<dyn Fn(&VmEnv, RawObject, &[JValue]) -> JValue + Send + Sync>;

/// Hook run when an instance of the class (or a subclass) is reclaimed
pub type CleanupHook = Arc<dyn Fn(&FinalizedObject) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Concrete,
    Abstract,
    Interface,
}

/// Snapshot of a reclaimed object, handed to cleanup hooks
#[derive(Debug, Clone)]
pub struct FinalizedObject {
    class_name: String,
    fields: Vec<(String, JValue)>,
}

impl FinalizedObject {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Last value of a `long` field
    pub fn long_field(&self, name: &str) -> Option<i64> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .and_then(|(_, value)| value.as_long())
    }
}

/// Fluent class definition
pub struct ClassBuilder {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(String, String)>,
    methods: Vec<(String, String, Option<MethodBody>)>,
    cleanup: Option<CleanupHook>,
    kind: ClassKind,
}

impl ClassBuilder {
    /// Concrete class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let superclass = (name != OBJECT).then(|| OBJECT.to_string());
        Self {
            name,
            superclass,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            cleanup: None,
            kind: ClassKind::Concrete,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            kind: ClassKind::Interface,
            ..Self::new(name)
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.kind = ClassKind::Abstract;
        self
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, sig: impl Into<String>) -> Self {
        self.fields.push((name.into(), sig.into()));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, sig: impl Into<String>, body: F) -> Self
    where
        F: Fn(&VmEnv, RawObject, &[JValue]) -> JValue + Send + Sync + 'static,
    {
        self.methods.push((name.into(), sig.into(), Some(Arc::new(body))));
        self
    }

    /// Declare a method without a body (resolved virtually on subclasses)
    pub fn abstract_method(mut self, name: impl Into<String>, sig: impl Into<String>) -> Self {
        self.methods.push((name.into(), sig.into(), None));
        self
    }

    pub fn on_cleanup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FinalizedObject) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("superclass", &self.superclass)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

pub(crate) const OBJECT: &str = "java/lang/Object";

pub(crate) struct FieldDef {
    pub name: String,
    pub sig: String,
    pub ty: JavaType,
}

pub(crate) struct MethodDef {
    pub name: String,
    pub sig: String,
    pub ret: JavaType,
    pub body: Option<MethodBody>,
}

pub(crate) struct ClassDef {
    pub id: ClassId,
    pub name: String,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    /// Inherited fields first, so slots are stable down the hierarchy
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub cleanup: Option<CleanupHook>,
    pub kind: ClassKind,
    /// Pinned `java/lang/Class` instance for this class
    pub mirror: usize,
}

impl ClassDef {
    fn declared(&self, name: &str, sig: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name && m.sig == sig)
    }
}

/// All defined classes, indexed by id and by slash-separated name
#[derive(Default)]
pub(crate) struct ClassTable {
    defs: Vec<Arc<ClassDef>>,
    by_name: HashMap<String, ClassId>,
}

impl ClassTable {
    pub fn get(&self, id: ClassId) -> Option<&Arc<ClassDef>> {
        self.defs.get(id)
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<ClassDef>> {
        self.by_name.get(name).and_then(|&id| self.defs.get(id))
    }

    pub fn next_id(&self) -> ClassId {
        self.defs.len()
    }

    /// Validate a builder against the table and turn it into a definition
    pub fn prepare(&self, builder: ClassBuilder, mirror: usize) -> Result<ClassDef, SandboxError> {
        let ClassBuilder {
            name,
            superclass,
            interfaces,
            fields: own_fields,
            methods: own_methods,
            cleanup,
            kind,
        } = builder;

        if self.by_name.contains_key(&name) {
            return Err(SandboxError::DuplicateClass(name));
        }

        let parent = match superclass {
            Some(superclass) => match self.lookup(&superclass) {
                Some(def) if def.kind != ClassKind::Interface => Some(def.clone()),
                _ => return Err(SandboxError::UnknownSuperclass { class: name, superclass }),
            },
            None => None,
        };

        let interfaces = interfaces
            .into_iter()
            .map(|iface| match self.lookup(&iface) {
                Some(def) if def.kind == ClassKind::Interface => Ok(def.id),
                _ => Err(SandboxError::UnknownInterface {
                    class: name.clone(),
                    interface: iface,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut fields: Vec<FieldDef> = parent
            .as_ref()
            .map(|p| {
                p.fields
                    .iter()
                    .map(|f| FieldDef {
                        name: f.name.clone(),
                        sig: f.sig.clone(),
                        ty: f.ty,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (field, sig) in own_fields {
            let ty = match JavaType::from_field_signature(&sig) {
                Some(ty) if ty != JavaType::Void => ty,
                _ => return Err(invalid(&name, &field, sig)),
            };
            fields.push(FieldDef { name: field, sig, ty });
        }

        let mut methods = Vec::with_capacity(own_methods.len());
        for (method, sig, body) in own_methods {
            let Some(parsed) = MethodSignature::parse(&sig) else {
                return Err(invalid(&name, &method, sig));
            };
            if body.is_none() && kind == ClassKind::Concrete {
                return Err(SandboxError::AbstractInConcrete { class: name, method });
            }
            methods.push(MethodDef {
                name: method,
                sig,
                ret: parsed.ret,
                body,
            });
        }

        Ok(ClassDef {
            id: self.next_id(),
            name,
            superclass: parent.map(|p| p.id),
            interfaces,
            fields,
            methods,
            cleanup,
            kind,
            mirror,
        })
    }

    pub fn insert(&mut self, def: ClassDef) -> Arc<ClassDef> {
        debug_assert_eq!(def.id, self.defs.len());
        let def = Arc::new(def);
        self.by_name.insert(def.name.clone(), def.id);
        self.defs.push(def.clone());
        def
    }

    /// Declaration visible from `class` (superclasses, then interfaces)
    pub fn find_method(&self, class: ClassId, name: &str, sig: &str) -> Option<&MethodDef> {
        let mut current = self.get(class);
        while let Some(def) = current {
            if let Some(method) = def.declared(name, sig) {
                return Some(method);
            }
            current = def.superclass.and_then(|id| self.get(id));
        }

        let mut current = self.get(class);
        while let Some(def) = current {
            for &iface in &def.interfaces {
                if let Some(method) = self.find_method(iface, name, sig) {
                    return Some(method);
                }
            }
            current = def.superclass.and_then(|id| self.get(id));
        }
        None
    }

    /// Most derived implementation for a receiver of class `class`
    pub fn find_body(&self, class: ClassId, name: &str, sig: &str) -> Option<MethodBody> {
        let mut current = self.get(class);
        while let Some(def) = current {
            if let Some(body) = def.declared(name, sig).and_then(|m| m.body.clone()) {
                return Some(body);
            }
            current = def.superclass.and_then(|id| self.get(id));
        }
        None
    }

    /// Field slot and type, searching the full inherited layout
    pub fn find_field(&self, class: ClassId, name: &str, sig: &str) -> Option<(usize, JavaType)> {
        self.get(class)?
            .fields
            .iter()
            .position(|f| f.name == name && f.sig == sig)
            .map(|slot| (slot, self.defs[class].fields[slot].ty))
    }

    /// Nearest cleanup hook up the superclass chain
    pub fn cleanup_hook(&self, class: ClassId) -> Option<CleanupHook> {
        let mut current = self.get(class);
        while let Some(def) = current {
            if let Some(hook) = &def.cleanup {
                return Some(hook.clone());
            }
            current = def.superclass.and_then(|id| self.get(id));
        }
        None
    }

    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(|def| def.superclass);
        }
        false
    }

    /// Snapshot for cleanup hooks
    pub fn finalized(&self, class: ClassId, values: Vec<JValue>) -> FinalizedObject {
        let (class_name, fields) = match self.get(class) {
            Some(def) => (
                def.name.clone(),
                def.fields
                    .iter()
                    .map(|f| f.name.clone())
                    .zip(values)
                    .collect(),
            ),
            None => (String::new(), Vec::new()),
        };
        FinalizedObject { class_name, fields }
    }
}

fn invalid(class: &str, member: &str, sig: String) -> SandboxError {
    SandboxError::InvalidSignature {
        class: class.to_string(),
        member: member.to_string(),
        sig,
    }
}
