//! jbridge - native functions as JVM functional interfaces, and back
//!
//! A native `NativeFn<A, R>` crosses into managed code as an instance of the
//! `java.util.function` interface selected by its shape (`IntPredicate` for
//! `i32 -> bool`, `Function` for `String -> String`, ...). A managed
//! instance of such an interface crosses back as a `NativeFn` that can be
//! called any number of times, on any attached thread.
//!
//! ```no_run
//! use jbridge::{runtime::Vm, NativeFn};
//!
//! let vm = Vm::new()?;
//! jbridge::sandbox::install_wrapper_classes(&vm)?;
//! let env = vm.attach_current_thread();
//!
//! let even = NativeFn::from_fn(|x: i32| x % 2 == 0);
//! let managed = jbridge::java_value(&*env, even).unwrap();
//! let back = jbridge::native_value::<i32, bool>(&*env, managed).unwrap();
//! assert!(back.call(4).unwrap());
//! # Ok::<(), jbridge::runtime::SandboxError>(())
//! ```

pub mod adapter;
pub mod callback;
pub mod class;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod function;
pub mod kind;
pub mod sandbox;

#[cfg(feature = "jvm")]
pub mod jvm;

pub use jbridge_runtime as runtime;

pub use adapter::{java_value, java_value_with, native_value, native_value_with};
pub use callback::{CallbackCell, ForwardingCallback, NativeCallback};
pub use class::Class;
pub use config::{BridgeConfig, ConfigError};
pub use convert::ArgType;
pub use descriptor::{FunctionalInterface, InterfaceDescriptor, Shape};
pub use dispatch::{shape_of, Dispatch, ShapeOf};
pub use error::{check_exception, BridgeError, JavaException, Result};
pub use function::NativeFn;
pub use kind::{Scoped, ValueKind};

use jbridge_runtime::logging;
use tracing::warn;

/// Load the configuration named by `JBRIDGE_CONFIG`, start logging and
/// install the configuration process-wide
pub fn init() {
    let (config, problem) = match BridgeConfig::from_env() {
        Ok(config) => (config, None),
        Err(error) => (BridgeConfig::default(), Some(error)),
    };

    logging::init_with_config(config.log_config());
    if let Some(error) = problem {
        warn!(target: "bridge", %error, "invalid bridge configuration, using defaults");
    }
    config.install();
}
