//! Core library classes every sandbox starts with
//!
//! `java/lang/Object` and `java/lang/Class` must be defined first: class
//! mirrors are instances of the class with id [`CLASS_CLASS_ID`].

use super::class::{ClassBuilder, ClassId};
use super::env::VmEnv;
use super::{SandboxError, Vm};
use crate::env::Env;
use crate::value::{JValue, RawObject};

pub(crate) const CLASS_CLASS_ID: ClassId = 1;

/// Slash-separated names of the builtin classes
pub mod names {
    pub const OBJECT: &str = "java/lang/Object";
    pub const CLASS: &str = "java/lang/Class";
    pub const STRING: &str = "java/lang/String";
    pub const THROWABLE: &str = "java/lang/Throwable";
    pub const EXCEPTION: &str = "java/lang/Exception";
    pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
    pub const ILLEGAL_STATE_EXCEPTION: &str = "java/lang/IllegalStateException";
    pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "java/lang/IllegalArgumentException";
    pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
    pub const UNSUPPORTED_OPERATION_EXCEPTION: &str = "java/lang/UnsupportedOperationException";
    pub const INSTANTIATION_EXCEPTION: &str = "java/lang/InstantiationException";
    pub const ERROR: &str = "java/lang/Error";
    pub const LINKAGE_ERROR: &str = "java/lang/LinkageError";
    pub const NO_CLASS_DEF_FOUND_ERROR: &str = "java/lang/NoClassDefFoundError";
    pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java/lang/IncompatibleClassChangeError";
    pub const NO_SUCH_METHOD_ERROR: &str = "java/lang/NoSuchMethodError";
    pub const NO_SUCH_FIELD_ERROR: &str = "java/lang/NoSuchFieldError";
    pub const ABSTRACT_METHOD_ERROR: &str = "java/lang/AbstractMethodError";
    pub const VIRTUAL_MACHINE_ERROR: &str = "java/lang/VirtualMachineError";
    pub const OUT_OF_MEMORY_ERROR: &str = "java/lang/OutOfMemoryError";
}

const TO_STRING: (&str, &str) = ("toString", "()Ljava/lang/String;");

/// Functional interfaces of `java.util.function` with their abstract method
const FUNCTIONAL_INTERFACES: &[(&str, &str, &str)] = &[
    ("java/util/function/Predicate", "test", "(Ljava/lang/Object;)Z"),
    ("java/util/function/IntPredicate", "test", "(I)Z"),
    ("java/util/function/LongPredicate", "test", "(J)Z"),
    ("java/util/function/DoublePredicate", "test", "(D)Z"),
    ("java/util/function/Function", "apply", "(Ljava/lang/Object;)Ljava/lang/Object;"),
    ("java/util/function/IntFunction", "apply", "(I)Ljava/lang/Object;"),
    ("java/util/function/LongFunction", "apply", "(J)Ljava/lang/Object;"),
    ("java/util/function/DoubleFunction", "apply", "(D)Ljava/lang/Object;"),
    ("java/util/function/ToIntFunction", "applyAsInt", "(Ljava/lang/Object;)I"),
    ("java/util/function/ToLongFunction", "applyAsLong", "(Ljava/lang/Object;)J"),
    ("java/util/function/ToDoubleFunction", "applyAsDouble", "(Ljava/lang/Object;)D"),
];

fn dotted(name: &str) -> String {
    name.replace('/', ".")
}

fn string_result(env: &VmEnv, value: &str) -> JValue {
    JValue::Object(env.new_string_utf(value))
}

fn string_arg(env: &VmEnv, this: RawObject) -> String {
    env.get_string_utf(this).unwrap_or_default()
}

pub(crate) fn install(vm: &Vm) -> Result<(), SandboxError> {
    vm.define_class(
        ClassBuilder::new(names::OBJECT)
            .method(TO_STRING.0, TO_STRING.1, |env, this, _| {
                let name = env.class_name_of(this).unwrap_or_default();
                string_result(env, &format!("{}@{:x}", dotted(&name), this.as_ptr() as usize))
            })
            .method("hashCode", "()I", |_, this, _| {
                JValue::Int((this.as_ptr() as usize >> 3) as i32)
            })
            .method("equals", "(Ljava/lang/Object;)Z", |env, this, args| {
                let other = args.first().and_then(JValue::as_object).unwrap_or_default();
                JValue::Boolean(env.is_same_object(this, other))
            }),
    )?;

    vm.define_class(
        ClassBuilder::new(names::CLASS)
            .abstract_class()
            .method("getName", "()Ljava/lang/String;", |env, this, _| {
                let name = env.mirror_name(this).unwrap_or_default();
                string_result(env, &dotted(&name))
            }),
    )?;

    vm.define_class(
        ClassBuilder::new(names::STRING)
            .method(TO_STRING.0, TO_STRING.1, |_, this, _| JValue::Object(this))
            .method("length", "()I", |env, this, _| {
                JValue::Int(string_arg(env, this).encode_utf16().count() as i32)
            })
            .method("isEmpty", "()Z", |env, this, _| {
                JValue::Boolean(string_arg(env, this).is_empty())
            })
            .method("toUpperCase", "()Ljava/lang/String;", |env, this, _| {
                string_result(env, &string_arg(env, this).to_uppercase())
            })
            .method("equals", "(Ljava/lang/Object;)Z", |env, this, args| {
                let other = args.first().and_then(JValue::as_object).unwrap_or_default();
                let equal = match env.get_string_utf(other) {
                    Some(other) => other == string_arg(env, this),
                    None => false,
                };
                JValue::Boolean(equal)
            }),
    )?;

    vm.define_class(
        ClassBuilder::new(names::THROWABLE)
            .method("getMessage", "()Ljava/lang/String;", |env, this, _| {
                match env.throwable_message(this) {
                    Some(message) => string_result(env, &message),
                    None => JValue::Object(RawObject::null()),
                }
            })
            .method(TO_STRING.0, TO_STRING.1, |env, this, _| {
                let name = dotted(&env.class_name_of(this).unwrap_or_default());
                match env.throwable_message(this) {
                    Some(message) => string_result(env, &format!("{name}: {message}")),
                    None => string_result(env, &name),
                }
            }),
    )?;

    let hierarchy = [
        (names::EXCEPTION, names::THROWABLE),
        (names::RUNTIME_EXCEPTION, names::EXCEPTION),
        (names::ILLEGAL_STATE_EXCEPTION, names::RUNTIME_EXCEPTION),
        (names::ILLEGAL_ARGUMENT_EXCEPTION, names::RUNTIME_EXCEPTION),
        (names::NULL_POINTER_EXCEPTION, names::RUNTIME_EXCEPTION),
        (names::UNSUPPORTED_OPERATION_EXCEPTION, names::RUNTIME_EXCEPTION),
        (names::INSTANTIATION_EXCEPTION, names::EXCEPTION),
        (names::ERROR, names::THROWABLE),
        (names::LINKAGE_ERROR, names::ERROR),
        (names::NO_CLASS_DEF_FOUND_ERROR, names::LINKAGE_ERROR),
        (names::INCOMPATIBLE_CLASS_CHANGE_ERROR, names::LINKAGE_ERROR),
        (names::NO_SUCH_METHOD_ERROR, names::INCOMPATIBLE_CLASS_CHANGE_ERROR),
        (names::NO_SUCH_FIELD_ERROR, names::INCOMPATIBLE_CLASS_CHANGE_ERROR),
        (names::ABSTRACT_METHOD_ERROR, names::INCOMPATIBLE_CLASS_CHANGE_ERROR),
        (names::VIRTUAL_MACHINE_ERROR, names::ERROR),
        (names::OUT_OF_MEMORY_ERROR, names::VIRTUAL_MACHINE_ERROR),
    ];
    for (class, superclass) in hierarchy {
        vm.define_class(ClassBuilder::new(class).extends(superclass))?;
    }

    for &(interface, method, sig) in FUNCTIONAL_INTERFACES {
        vm.define_class(ClassBuilder::interface(interface).abstract_method(method, sig))?;
    }

    Ok(())
}
