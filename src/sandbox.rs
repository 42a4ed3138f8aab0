//! Wrapper classes for the sandbox runtime
//!
//! Defines `io/jbridge/function/NativeCallback` and one subclass per shape,
//! mirroring the Java sources under `java/`. Method bodies call the entry
//! glue; the base class cleanup hook frees the native callback when the
//! last reference to a wrapper instance goes away.

use crate::callback::CallbackCell;
use crate::descriptor::{
    self, FunctionalInterface, CALLBACK_BASE_CLASS, NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG, REGISTER_METHOD,
    REGISTER_SIG,
};
use crate::entry::entry;
use crate::kind::ValueKind;
use jbridge_runtime::sandbox::names;
use jbridge_runtime::{ClassBuilder, JValue, SandboxError, Vm};
use tracing::debug;

/// Define the wrapper classes in `vm` (no-op if already defined)
pub fn install_wrapper_classes(vm: &Vm) -> Result<(), SandboxError> {
    if vm.has_class(CALLBACK_BASE_CLASS) {
        return Ok(());
    }

    vm.define_class(
        ClassBuilder::new(CALLBACK_BASE_CLASS)
            .abstract_class()
            .field(NATIVE_POINTER_FIELD, NATIVE_POINTER_SIG)
            // Reclamation already runs the cleanup hook below
            .method(REGISTER_METHOD, REGISTER_SIG, |_, _, _| JValue::Void)
            .on_cleanup(|object| {
                if let Some(address) = object.long_field(NATIVE_POINTER_FIELD) {
                    // Safety: the pointer was written by the adapter and this
                    // hook runs once, when the instance is reclaimed
                    unsafe { CallbackCell::release(address) };
                }
            }),
    )?;

    install::<descriptor::Predicate>(vm)?;
    install::<descriptor::IntPredicate>(vm)?;
    install::<descriptor::LongPredicate>(vm)?;
    install::<descriptor::DoublePredicate>(vm)?;
    install::<descriptor::Function>(vm)?;
    install::<descriptor::IntFunction>(vm)?;
    install::<descriptor::LongFunction>(vm)?;
    install::<descriptor::DoubleFunction>(vm)?;
    install::<descriptor::ToIntFunction>(vm)?;
    install::<descriptor::ToLongFunction>(vm)?;
    install::<descriptor::ToDoubleFunction>(vm)?;

    debug!(target: "bridge", "sandbox wrapper classes installed");
    Ok(())
}

fn install<S: FunctionalInterface>(vm: &Vm) -> Result<(), SandboxError> {
    let descriptor = S::DESCRIPTOR;
    vm.define_class(
        ClassBuilder::new(descriptor.wrapper_class)
            .extends(CALLBACK_BASE_CLASS)
            .implements(descriptor.interface_path())
            .method(descriptor.method, descriptor.method_sig, move |env, this, args| {
                match args.first().copied().and_then(S::ArgKind::from_jvalue) {
                    Some(arg) => S::RetKind::into_jvalue(entry::<S>(env, this, arg)),
                    None => {
                        env.throw_new_by_name(names::ILLEGAL_ARGUMENT_EXCEPTION, descriptor.method_sig);
                        JValue::zero(S::RetKind::JAVA_TYPE)
                    }
                }
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Shape;
    use jbridge_runtime::Env;

    #[test]
    fn test_install_defines_every_wrapper() {
        let vm = Vm::new().unwrap();
        install_wrapper_classes(&vm).unwrap();
        install_wrapper_classes(&vm).unwrap();

        assert!(vm.has_class(CALLBACK_BASE_CLASS));
        for shape in Shape::ALL {
            assert!(vm.has_class(shape.descriptor().wrapper_class), "{shape}");
        }
    }

    #[test]
    fn test_base_class_is_abstract() {
        let vm = Vm::new().unwrap();
        install_wrapper_classes(&vm).unwrap();
        let env = vm.attach_current_thread();

        let base = env.find_class(CALLBACK_BASE_CLASS);
        assert!(env.alloc_object(base).is_null());
        assert!(env.exception_check());
        env.exception_clear();
        env.delete_local_ref(base);
    }

    #[test]
    fn test_uninitialised_wrapper_throws_illegal_state() {
        let vm = Vm::new().unwrap();
        install_wrapper_classes(&vm).unwrap();
        let env = vm.attach_current_thread();

        // Allocated directly, so nativePointer is still 0
        let class = env.find_class("io/jbridge/function/NativeIntPredicate");
        let wrapper = env.alloc_object(class);
        let test = env.get_method_id(class, "test", "(I)Z");

        assert!(!env.call_boolean_method(wrapper, test, &[JValue::Int(1)]));
        let throwable = env.exception_occurred();
        env.exception_clear();
        assert_eq!(
            env.class_name_of(throwable).as_deref(),
            Some(names::ILLEGAL_STATE_EXCEPTION)
        );

        env.delete_local_ref(throwable);
        env.delete_local_ref(wrapper);
        env.delete_local_ref(class);
        assert_eq!(vm.hooks_run(), 1);
    }
}
