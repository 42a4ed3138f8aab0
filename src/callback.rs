//! Native callbacks owned by managed wrapper instances
//!
//! A wrapper instance stores the address of a `CallbackCell` in its
//! `nativePointer` field. The cell is created by the native-to-managed
//! adapter and freed exactly once by the wrapper's cleanup action, which
//! calls [`CallbackCell::release`].

use crate::convert::ArgType;
use crate::descriptor::{FunctionalInterface, Shape};
use crate::error::{BridgeError, Result};
use crate::function::NativeFn;
use crate::kind::{Crossing, ValueKind};
use jbridge_runtime::logging::log_callback_released;
use jbridge_runtime::Env;
use std::any::Any;
use std::marker::PhantomData;

/// Native side of a wrapper instance, seen in crossing representation
pub trait NativeCallback<AK: ValueKind, RK: ValueKind>: Send + Sync {
    fn invoke(&self, env: &dyn Env, arg: Crossing<AK>) -> Result<Crossing<RK>>;
}

/// Converts the argument, calls the owned function, converts the result
///
/// Unaware of which interface it backs: the same callback serves any shape
/// whose kinds match `A` and `R`.
pub struct ForwardingCallback<A, R> {
    function: NativeFn<A, R>,
}

impl<A: ArgType, R: ArgType> ForwardingCallback<A, R> {
    pub fn new(function: NativeFn<A, R>) -> Self {
        Self { function }
    }
}

impl<A: ArgType, R: ArgType> NativeCallback<A::Kind, R::Kind> for ForwardingCallback<A, R> {
    fn invoke(&self, env: &dyn Env, arg: Crossing<A::Kind>) -> Result<Crossing<R::Kind>> {
        let arg = A::native_value(env, arg)?;
        let result = self.function.call(arg)?;
        R::java_value(env, result)
    }
}

type BoxedCallback<S> = Box<
    dyn NativeCallback<<S as FunctionalInterface>::ArgKind, <S as FunctionalInterface>::RetKind>,
>;

/// Heap cell behind a `nativePointer`, erasing the shape of its callback
pub struct CallbackCell {
    shape: Shape,
    callback: Box<dyn Any + Send + Sync>,
}

/// Typed view of the callback, stored inside the erased box
struct Typed<S: FunctionalInterface> {
    callback: BoxedCallback<S>,
    _shape: PhantomData<fn() -> S>,
}

impl CallbackCell {
    pub fn new<S, C>(callback: C) -> Self
    where
        S: FunctionalInterface,
        C: NativeCallback<S::ArgKind, S::RetKind> + 'static,
    {
        Self {
            shape: S::SHAPE,
            callback: Box::new(Typed::<S> {
                callback: Box::new(callback),
                _shape: PhantomData,
            }),
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Callback as shape `S`; fails if the cell was created for another shape
    pub fn callback<S: FunctionalInterface>(&self) -> Result<&dyn NativeCallback<S::ArgKind, S::RetKind>> {
        match self.callback.downcast_ref::<Typed<S>>() {
            Some(typed) => Ok(typed.callback.as_ref()),
            None => Err(BridgeError::Conversion(format!(
                "native callback of {} invoked as {}",
                self.shape,
                S::SHAPE
            ))),
        }
    }

    /// Leak the cell; the address is what `nativePointer` stores
    pub fn into_address(self) -> i64 {
        Box::into_raw(Box::new(self)) as usize as i64
    }

    /// Borrow the cell behind a `nativePointer` value (`None` for 0)
    ///
    /// # Safety
    /// `address` must be 0 or come from [`CallbackCell::into_address`] and
    /// not have been released yet. The cell must outlive the borrow.
    pub unsafe fn from_address<'a>(address: i64) -> Option<&'a CallbackCell> {
        (address as usize as *const CallbackCell).as_ref()
    }

    /// Free the cell behind a `nativePointer` value; 0 is ignored
    ///
    /// # Safety
    /// `address` must be 0 or come from [`CallbackCell::into_address`], and
    /// each address may be released only once.
    pub unsafe fn release(address: i64) -> bool {
        let cell = address as usize as *mut CallbackCell;
        if cell.is_null() {
            return false;
        }
        drop(Box::from_raw(cell));
        log_callback_released(address as usize);
        true
    }
}

impl std::fmt::Debug for CallbackCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackCell").field("shape", &self.shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{IntFunction, IntPredicate, LongPredicate};
    use jbridge_runtime::Vm;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_forwarding_primitive() {
        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();

        let even = ForwardingCallback::new(NativeFn::from_fn(|x: i32| x % 2 == 0));
        assert!(NativeCallback::invoke(&even, &*env, 4).unwrap());
        assert!(!NativeCallback::invoke(&even, &*env, 7).unwrap());
    }

    #[test]
    fn test_forwarding_string_result() {
        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();

        let callback = ForwardingCallback::new(NativeFn::from_fn(|x: i32| format!("#{x}")));
        let raw = NativeCallback::invoke(&callback, &*env, 12).unwrap();
        assert_eq!(env.get_string_utf(raw).as_deref(), Some("#12"));
        env.delete_local_ref(raw);
    }

    #[test]
    fn test_cell_round_trip() {
        let cell = CallbackCell::new::<IntPredicate, _>(ForwardingCallback::new(NativeFn::from_fn(
            |x: i32| x > 0,
        )));
        assert_eq!(cell.shape(), Shape::IntPredicate);

        let address = cell.into_address();
        assert_ne!(address, 0);

        let vm = Vm::new().unwrap();
        let env = vm.attach_current_thread();
        unsafe {
            let cell = CallbackCell::from_address(address).unwrap();
            assert!(cell.callback::<IntPredicate>().unwrap().invoke(&*env, 3).unwrap());
            assert!(matches!(
                cell.callback::<LongPredicate>(),
                Err(BridgeError::Conversion(_))
            ));
            assert!(CallbackCell::release(address));
        }
    }

    #[test]
    fn test_release_drops_function() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Flag(dropped.clone());
        let function = NativeFn::from_fn(move |x: i32| {
            let _keep = &flag;
            x.to_string()
        });

        let address = CallbackCell::new::<IntFunction, _>(ForwardingCallback::new(function)).into_address();
        assert!(!dropped.load(Ordering::SeqCst));
        unsafe {
            assert!(CallbackCell::release(address));
            assert!(!CallbackCell::release(0));
            assert!(CallbackCell::from_address(0).is_none());
        }
        assert!(dropped.load(Ordering::SeqCst));
    }
}
