//! Process-wide configuration is installed once, so this binary holds a
//! single test.

mod common;

use common::{round_trip, sandbox};
use jbridge::config::{self, CONFIG_ENV};
use jbridge::NativeFn;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

#[test]
fn test_installed_config_controls_panics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jbridge.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[logging]\nlevel = \"debug\"\n\n[callbacks]\ncatch_panics = false").unwrap();
    drop(file);

    std::env::set_var(CONFIG_ENV, &path);
    jbridge::init();

    let installed = config::current();
    assert!(!installed.callbacks.catch_panics);
    assert_eq!(installed.logging.level, "debug");

    // A second init keeps the first configuration
    std::env::remove_var(CONFIG_ENV);
    jbridge::init();
    assert!(!config::current().callbacks.catch_panics);

    let vm = sandbox();
    let env = vm.attach_current_thread();
    let panicking = round_trip(
        &*env,
        NativeFn::from_fn(|x: i32| -> bool {
            assert!(x >= 0, "negative input {x}");
            true
        }),
    );
    assert!(panicking.call(1).unwrap());

    // With panics not caught, the unwind reaches the native caller
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| panicking.call(-1)));
    let payload = outcome.unwrap_err();
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(message.contains("negative input -1"), "{message}");
}
