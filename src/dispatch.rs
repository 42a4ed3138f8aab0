//! Shape dispatch - which functional interface a native function crosses as
//!
//! Resolution is a trait lookup keyed on the argument and result kinds, so
//! every supported shape selects exactly one interface at compile time and
//! every other shape fails to compile:
//!
//! | argument | result | interface |
//! |---|---|---|
//! | `Int` / `Long` / `Double` | `Boolean` | `IntPredicate` / `LongPredicate` / `DoublePredicate` |
//! | `Object` | `Boolean` | `Predicate` |
//! | `Int` / `Long` / `Double` | `Object` | `IntFunction` / `LongFunction` / `DoubleFunction` |
//! | `Object` | `Int` / `Long` / `Double` | `ToIntFunction` / `ToLongFunction` / `ToDoubleFunction` |
//! | `Object` | `Object` | `Function` |
//!
//! ```compile_fail
//! // numeric to numeric has no interface
//! let _ = jbridge::shape_of::<i32, i64>();
//! ```
//!
//! ```compile_fail
//! // nor does a boolean argument
//! let _ = jbridge::shape_of::<bool, String>();
//! ```

use crate::convert::ArgType;
use crate::descriptor::{self, FunctionalInterface, Shape};
use crate::kind::{Boolean, Double, Int, Long, Object, ValueKind};

/// Interface selected for argument kind `Self` and result kind `RK`
#[diagnostic::on_unimplemented(
    message = "no functional interface for native functions of kind `{Self} -> {RK}`",
    label = "unsupported function shape",
    note = "numeric arguments need a boolean or object result, numeric results need an object argument"
)]
pub trait Dispatch<RK: ValueKind>: ValueKind {
    type Interface: FunctionalInterface<ArgKind = Self, RetKind = RK>;
}

macro_rules! dispatch {
    ($($arg:ty, $ret:ty => $interface:ident;)*) => {
        $(
            impl Dispatch<$ret> for $arg {
                type Interface = descriptor::$interface;
            }
        )*
    };
}

dispatch! {
    Int, Boolean => IntPredicate;
    Long, Boolean => LongPredicate;
    Double, Boolean => DoublePredicate;
    Object, Boolean => Predicate;

    Int, Object => IntFunction;
    Long, Object => LongFunction;
    Double, Object => DoubleFunction;

    Object, Int => ToIntFunction;
    Object, Long => ToLongFunction;
    Object, Double => ToDoubleFunction;

    Object, Object => Function;
}

/// Interface a native function `A -> R` crosses as
pub type ShapeOf<A, R> =
    <<A as ArgType>::Kind as Dispatch<<R as ArgType>::Kind>>::Interface;

/// Runtime tag of the interface selected for `A -> R`
pub fn shape_of<A, R>() -> Shape
where
    A: ArgType,
    R: ArgType,
    A::Kind: Dispatch<R::Kind>,
{
    <ShapeOf<A, R> as FunctionalInterface>::SHAPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_runtime::GlobalRef;

    #[test]
    fn test_numeric_predicates() {
        assert_eq!(shape_of::<i32, bool>(), Shape::IntPredicate);
        assert_eq!(shape_of::<i64, bool>(), Shape::LongPredicate);
        assert_eq!(shape_of::<f64, bool>(), Shape::DoublePredicate);
        assert_eq!(shape_of::<String, bool>(), Shape::Predicate);
        assert_eq!(shape_of::<GlobalRef, bool>(), Shape::Predicate);
    }

    #[test]
    fn test_numeric_arguments() {
        assert_eq!(shape_of::<i32, String>(), Shape::IntFunction);
        assert_eq!(shape_of::<i64, Option<String>>(), Shape::LongFunction);
        assert_eq!(shape_of::<f64, GlobalRef>(), Shape::DoubleFunction);
    }

    #[test]
    fn test_numeric_results() {
        assert_eq!(shape_of::<String, i32>(), Shape::ToIntFunction);
        assert_eq!(shape_of::<String, i64>(), Shape::ToLongFunction);
        assert_eq!(shape_of::<Option<String>, f64>(), Shape::ToDoubleFunction);
    }

    #[test]
    fn test_object_to_object() {
        assert_eq!(shape_of::<String, String>(), Shape::Function);
        assert_eq!(shape_of::<GlobalRef, Option<String>>(), Shape::Function);
    }

    #[test]
    fn test_functions_nest_as_objects() {
        use crate::NativeFn;

        assert_eq!(shape_of::<NativeFn<i32, bool>, bool>(), Shape::Predicate);
        assert_eq!(shape_of::<i32, NativeFn<String, String>>(), Shape::IntFunction);
    }
}
