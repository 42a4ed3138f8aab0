//! Class helper - lookups that fail with `BridgeError` instead of a
//! pending exception

use crate::error::{class_name, BridgeError, JavaException, Result};
use jbridge_runtime::{Env, FieldId, LocalRef, MethodId, RawObject};

/// A managed class held by a local reference
pub struct Class<'env> {
    class: LocalRef<'env>,
    /// Path it was found by; `None` for the class of an instance
    name: Option<String>,
}

impl<'env> Class<'env> {
    /// Look up a class by slash-separated path
    pub fn find(env: &'env dyn Env, path: &str) -> Result<Self> {
        let class = LocalRef::new(env, env.find_class(path));
        if class.is_null() {
            return Err(lookup_error(env, || format!("class {path}")));
        }
        Ok(Self {
            class,
            name: Some(path.to_string()),
        })
    }

    /// Class of an object instance
    pub fn of(env: &'env dyn Env, obj: RawObject) -> Result<Self> {
        if obj.is_null() {
            return Err(BridgeError::null("java.lang.Object"));
        }
        let class = LocalRef::new(env, env.get_object_class(obj));
        if class.is_null() {
            return Err(lookup_error(env, || "class of instance".to_string()));
        }
        Ok(Self { class, name: None })
    }

    #[inline]
    pub fn raw(&self) -> RawObject {
        self.class.raw()
    }

    /// Path the class was found by, or its `getName()`
    ///
    /// Calls into the runtime for instance classes, so no exception may be
    /// pending.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => class_name(self.class.env(), self.raw()).unwrap_or_else(|| "java.lang.Object".to_string()),
        }
    }

    pub fn method_id(&self, name: &str, sig: &str) -> Result<MethodId> {
        let env = self.class.env();
        let method = env.get_method_id(self.raw(), name, sig);
        if method.is_null() || env.exception_check() {
            return Err(lookup_error(env, || format!("method {}.{name}{sig}", self.name())));
        }
        Ok(method)
    }

    pub fn field_id(&self, name: &str, sig: &str) -> Result<FieldId> {
        let env = self.class.env();
        let field = env.get_field_id(self.raw(), name, sig);
        if field.is_null() || env.exception_check() {
            return Err(lookup_error(env, || format!("field {}.{name}:{sig}", self.name())));
        }
        Ok(field)
    }
}

/// Clear the pending lookup error, then describe it
fn lookup_error(env: &dyn Env, what: impl FnOnce() -> String) -> BridgeError {
    match JavaException::take(env) {
        Some(exception) => BridgeError::Lookup {
            what: format!("{} ({})", what(), exception.message()),
        },
        None => BridgeError::Lookup { what: what() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_runtime::Vm;

    #[test]
    fn test_find_and_resolve() {
        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();
        let env: &dyn Env = &*env;

        let class = Class::find(env, "java/lang/String").unwrap();
        assert!(!class.method_id("length", "()I").unwrap().is_null());
    }

    #[test]
    fn test_missing_class_is_cleared() {
        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();
        let env: &dyn Env = &*env;

        let error = Class::find(env, "com/example/Missing").err().unwrap();
        match error {
            BridgeError::Lookup { what } => {
                assert!(what.contains("com/example/Missing"), "{what}");
                assert!(what.contains("NoClassDefFoundError"), "{what}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!env.exception_check());
    }

    #[test]
    fn test_missing_members() {
        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();
        let env: &dyn Env = &*env;

        let string = env.new_string_utf("s");
        let class = Class::of(env, string).unwrap();
        match class.method_id("nope", "()V") {
            Err(BridgeError::Lookup { what }) => {
                assert!(what.starts_with("method java.lang.String.nope()V"), "{what}")
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!env.exception_check());
        assert!(matches!(class.field_id("nope", "J"), Err(BridgeError::Lookup { .. })));
        assert!(!env.exception_check());

        drop(class);
        env.delete_local_ref(string);
        assert_eq!(vm.stats().live_objects, 0);
    }
}
