//! Functional interface descriptors - the wire contract per shape
//!
//! Each shape marker fixes the managed interface, the wrapper class that
//! hosts a native callback, the abstract method, and the typed call used to
//! invoke that method. The typed calls are deliberately one per shape: the
//! argument travels in its own primitive slot and the result comes back
//! through the matching `call_*_method`, never through a boxed path.

use crate::convert::ArgType;
use crate::kind::{Boolean, Crossing, Double, Int, Long, Object, ValueKind};
use jbridge_runtime::{Env, JValue, MethodId, RawObject};
use std::fmt;

/// Base class of every wrapper; owns the `nativePointer` field
pub const CALLBACK_BASE_CLASS: &str = "io/jbridge/function/NativeCallback";

/// Field holding the address of the native callback
pub const NATIVE_POINTER_FIELD: &str = "nativePointer";
pub const NATIVE_POINTER_SIG: &str = "J";

/// Base class method that ties the callback's release to the instance
pub const REGISTER_METHOD: &str = "registerCleanup";
pub const REGISTER_SIG: &str = "()V";

/// Which type parameters the interface declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generics {
    None,
    Arg,
    Result,
    Both,
}

/// Constant description of one functional interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// Qualified name, e.g. `java.util.function.IntPredicate`
    pub interface: &'static str,
    /// Type signature, e.g. `Ljava/util/function/IntPredicate;`
    pub signature: &'static str,
    /// Managed class implementing the interface over a native callback
    pub wrapper_class: &'static str,
    pub method: &'static str,
    pub method_sig: &'static str,
    pub generics: Generics,
}

impl InterfaceDescriptor {
    /// Slash-separated interface path, e.g. `java/util/function/IntPredicate`
    pub fn interface_path(&self) -> &'static str {
        let signature = self.signature;
        &signature[1..signature.len() - 1]
    }

    /// Java type for a native shape, e.g. `java.util.function.Function<A,R>`
    pub fn java_name(&self, arg: &str, result: &str) -> String {
        match self.generics {
            Generics::None => self.interface.to_string(),
            Generics::Arg => format!("{}<{arg}>", self.interface),
            Generics::Result => format!("{}<{result}>", self.interface),
            Generics::Both => format!("{}<{arg},{result}>", self.interface),
        }
    }
}

/// A managed functional interface a native function can cross as
pub trait FunctionalInterface: Send + Sync + 'static {
    type ArgKind: ValueKind;
    type RetKind: ValueKind;

    const SHAPE: Shape;
    const DESCRIPTOR: InterfaceDescriptor;

    /// Call the abstract method on `target`
    ///
    /// Object results are new local references owned by the caller. The
    /// caller must check for a pending exception before using the result.
    fn invoke(
        env: &dyn Env,
        target: RawObject,
        method: MethodId,
        arg: Crossing<Self::ArgKind>,
    ) -> Crossing<Self::RetKind>;

    /// Rendered Java type for the native shape `A -> R`
    fn java_name<A: ArgType, R: ArgType>() -> String {
        Self::DESCRIPTOR.java_name(&A::java_name(), &R::java_name())
    }
}

macro_rules! descriptor {
    ($interface:literal, $wrapper:literal, $method:literal, $sig:literal, $generics:ident) => {
        InterfaceDescriptor {
            interface: concat!("java.util.function.", $interface),
            signature: concat!("Ljava/util/function/", $interface, ";"),
            wrapper_class: concat!("io/jbridge/function/", $wrapper),
            method: $method,
            method_sig: $sig,
            generics: Generics::$generics,
        }
    };
}

// ===== Predicates =====

/// `java.util.function.Predicate<T>`: object to boolean
#[derive(Debug)]
pub enum Predicate {}

impl FunctionalInterface for Predicate {
    type ArgKind = Object;
    type RetKind = Boolean;

    const SHAPE: Shape = Shape::Predicate;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("Predicate", "NativePredicate", "test", "(Ljava/lang/Object;)Z", Arg);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: RawObject) -> bool {
        env.call_boolean_method(target, method, &[JValue::Object(arg)])
    }
}

/// `java.util.function.IntPredicate`
#[derive(Debug)]
pub enum IntPredicate {}

impl FunctionalInterface for IntPredicate {
    type ArgKind = Int;
    type RetKind = Boolean;

    const SHAPE: Shape = Shape::IntPredicate;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("IntPredicate", "NativeIntPredicate", "test", "(I)Z", None);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: i32) -> bool {
        env.call_boolean_method(target, method, &[JValue::Int(arg)])
    }
}

/// `java.util.function.LongPredicate`
#[derive(Debug)]
pub enum LongPredicate {}

impl FunctionalInterface for LongPredicate {
    type ArgKind = Long;
    type RetKind = Boolean;

    const SHAPE: Shape = Shape::LongPredicate;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("LongPredicate", "NativeLongPredicate", "test", "(J)Z", None);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: i64) -> bool {
        env.call_boolean_method(target, method, &[JValue::Long(arg)])
    }
}

/// `java.util.function.DoublePredicate`
#[derive(Debug)]
pub enum DoublePredicate {}

impl FunctionalInterface for DoublePredicate {
    type ArgKind = Double;
    type RetKind = Boolean;

    const SHAPE: Shape = Shape::DoublePredicate;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("DoublePredicate", "NativeDoublePredicate", "test", "(D)Z", None);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: f64) -> bool {
        env.call_boolean_method(target, method, &[JValue::Double(arg)])
    }
}

// ===== Functions with object results =====

/// `java.util.function.Function<T,R>`: object to object
#[derive(Debug)]
pub enum Function {}

impl FunctionalInterface for Function {
    type ArgKind = Object;
    type RetKind = Object;

    const SHAPE: Shape = Shape::Function;
    const DESCRIPTOR: InterfaceDescriptor = descriptor!(
        "Function",
        "NativeFunction",
        "apply",
        "(Ljava/lang/Object;)Ljava/lang/Object;",
        Both
    );

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: RawObject) -> RawObject {
        env.call_object_method(target, method, &[JValue::Object(arg)])
    }
}

/// `java.util.function.IntFunction<R>`
#[derive(Debug)]
pub enum IntFunction {}

impl FunctionalInterface for IntFunction {
    type ArgKind = Int;
    type RetKind = Object;

    const SHAPE: Shape = Shape::IntFunction;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("IntFunction", "NativeIntFunction", "apply", "(I)Ljava/lang/Object;", Result);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: i32) -> RawObject {
        env.call_object_method(target, method, &[JValue::Int(arg)])
    }
}

/// `java.util.function.LongFunction<R>`
#[derive(Debug)]
pub enum LongFunction {}

impl FunctionalInterface for LongFunction {
    type ArgKind = Long;
    type RetKind = Object;

    const SHAPE: Shape = Shape::LongFunction;
    const DESCRIPTOR: InterfaceDescriptor =
        descriptor!("LongFunction", "NativeLongFunction", "apply", "(J)Ljava/lang/Object;", Result);

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: i64) -> RawObject {
        env.call_object_method(target, method, &[JValue::Long(arg)])
    }
}

/// `java.util.function.DoubleFunction<R>`
#[derive(Debug)]
pub enum DoubleFunction {}

impl FunctionalInterface for DoubleFunction {
    type ArgKind = Double;
    type RetKind = Object;

    const SHAPE: Shape = Shape::DoubleFunction;
    const DESCRIPTOR: InterfaceDescriptor = descriptor!(
        "DoubleFunction",
        "NativeDoubleFunction",
        "apply",
        "(D)Ljava/lang/Object;",
        Result
    );

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: f64) -> RawObject {
        env.call_object_method(target, method, &[JValue::Double(arg)])
    }
}

// ===== Functions with numeric results =====

/// `java.util.function.ToIntFunction<T>`
#[derive(Debug)]
pub enum ToIntFunction {}

impl FunctionalInterface for ToIntFunction {
    type ArgKind = Object;
    type RetKind = Int;

    const SHAPE: Shape = Shape::ToIntFunction;
    const DESCRIPTOR: InterfaceDescriptor = descriptor!(
        "ToIntFunction",
        "NativeToIntFunction",
        "applyAsInt",
        "(Ljava/lang/Object;)I",
        Arg
    );

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: RawObject) -> i32 {
        env.call_int_method(target, method, &[JValue::Object(arg)])
    }
}

/// `java.util.function.ToLongFunction<T>`
#[derive(Debug)]
pub enum ToLongFunction {}

impl FunctionalInterface for ToLongFunction {
    type ArgKind = Object;
    type RetKind = Long;

    const SHAPE: Shape = Shape::ToLongFunction;
    const DESCRIPTOR: InterfaceDescriptor = descriptor!(
        "ToLongFunction",
        "NativeToLongFunction",
        "applyAsLong",
        "(Ljava/lang/Object;)J",
        Arg
    );

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: RawObject) -> i64 {
        env.call_long_method(target, method, &[JValue::Object(arg)])
    }
}

/// `java.util.function.ToDoubleFunction<T>`
#[derive(Debug)]
pub enum ToDoubleFunction {}

impl FunctionalInterface for ToDoubleFunction {
    type ArgKind = Object;
    type RetKind = Double;

    const SHAPE: Shape = Shape::ToDoubleFunction;
    const DESCRIPTOR: InterfaceDescriptor = descriptor!(
        "ToDoubleFunction",
        "NativeToDoubleFunction",
        "applyAsDouble",
        "(Ljava/lang/Object;)D",
        Arg
    );

    #[inline]
    fn invoke(env: &dyn Env, target: RawObject, method: MethodId, arg: RawObject) -> f64 {
        env.call_double_method(target, method, &[JValue::Object(arg)])
    }
}

/// Runtime tag of a shape, for diagnostics and class installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Predicate,
    IntPredicate,
    LongPredicate,
    DoublePredicate,
    Function,
    IntFunction,
    LongFunction,
    DoubleFunction,
    ToIntFunction,
    ToLongFunction,
    ToDoubleFunction,
}

impl Shape {
    pub const ALL: [Shape; 11] = [
        Shape::Predicate,
        Shape::IntPredicate,
        Shape::LongPredicate,
        Shape::DoublePredicate,
        Shape::Function,
        Shape::IntFunction,
        Shape::LongFunction,
        Shape::DoubleFunction,
        Shape::ToIntFunction,
        Shape::ToLongFunction,
        Shape::ToDoubleFunction,
    ];

    pub const fn descriptor(self) -> InterfaceDescriptor {
        match self {
            Shape::Predicate => Predicate::DESCRIPTOR,
            Shape::IntPredicate => IntPredicate::DESCRIPTOR,
            Shape::LongPredicate => LongPredicate::DESCRIPTOR,
            Shape::DoublePredicate => DoublePredicate::DESCRIPTOR,
            Shape::Function => Function::DESCRIPTOR,
            Shape::IntFunction => IntFunction::DESCRIPTOR,
            Shape::LongFunction => LongFunction::DESCRIPTOR,
            Shape::DoubleFunction => DoubleFunction::DESCRIPTOR,
            Shape::ToIntFunction => ToIntFunction::DESCRIPTOR,
            Shape::ToLongFunction => ToLongFunction::DESCRIPTOR,
            Shape::ToDoubleFunction => ToDoubleFunction::DESCRIPTOR,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_runtime::MethodSignature;

    #[test]
    fn test_wire_table() {
        let d = IntPredicate::DESCRIPTOR;
        assert_eq!(d.interface, "java.util.function.IntPredicate");
        assert_eq!(d.signature, "Ljava/util/function/IntPredicate;");
        assert_eq!(d.wrapper_class, "io/jbridge/function/NativeIntPredicate");
        assert_eq!((d.method, d.method_sig), ("test", "(I)Z"));

        let d = ToDoubleFunction::DESCRIPTOR;
        assert_eq!((d.method, d.method_sig), ("applyAsDouble", "(Ljava/lang/Object;)D"));
        assert_eq!(d.interface_path(), "java/util/function/ToDoubleFunction");
    }

    #[test]
    fn test_method_signatures_match_kinds() {
        fn check<S: FunctionalInterface>() {
            let sig = MethodSignature::parse(S::DESCRIPTOR.method_sig).unwrap();
            assert_eq!(sig.params, vec![S::ArgKind::JAVA_TYPE], "{}", S::SHAPE);
            assert_eq!(sig.ret, S::RetKind::JAVA_TYPE, "{}", S::SHAPE);
            assert_eq!(S::SHAPE.descriptor(), S::DESCRIPTOR);
        }

        check::<Predicate>();
        check::<IntPredicate>();
        check::<LongPredicate>();
        check::<DoublePredicate>();
        check::<Function>();
        check::<IntFunction>();
        check::<LongFunction>();
        check::<DoubleFunction>();
        check::<ToIntFunction>();
        check::<ToLongFunction>();
        check::<ToDoubleFunction>();
    }

    #[test]
    fn test_wrappers_are_distinct() {
        let mut wrappers: Vec<_> = Shape::ALL.iter().map(|s| s.descriptor().wrapper_class).collect();
        wrappers.sort_unstable();
        wrappers.dedup();
        assert_eq!(wrappers.len(), Shape::ALL.len());
    }

    #[test]
    fn test_generic_names() {
        assert_eq!(
            Function::java_name::<String, String>(),
            "java.util.function.Function<java.lang.String,java.lang.String>"
        );
        assert_eq!(
            Predicate::java_name::<String, bool>(),
            "java.util.function.Predicate<java.lang.String>"
        );
        assert_eq!(IntPredicate::java_name::<i32, bool>(), "java.util.function.IntPredicate");
        assert_eq!(
            LongFunction::java_name::<i64, String>(),
            "java.util.function.LongFunction<java.lang.String>"
        );
        assert_eq!(
            ToIntFunction::java_name::<String, i32>(),
            "java.util.function.ToIntFunction<java.lang.String>"
        );
    }
}
