//! `consistency.abort_on_detached` ends the process, so the call runs in a
//! child copy of this test binary.

mod common;

use common::{round_trip, sandbox};
use jbridge::config::CONFIG_ENV;
use jbridge::NativeFn;
use std::process::Command;

const CHILD_ENV: &str = "JBRIDGE_ABORT_CHILD";
const TEST_NAME: &str = "test_detached_call_aborts_when_configured";

#[test]
fn test_detached_call_aborts_when_configured() {
    if std::env::var_os(CHILD_ENV).is_some() {
        detached_call();
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jbridge.toml");
    std::fs::write(&path, "[consistency]\nabort_on_detached = true\n").unwrap();

    let output = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", TEST_NAME, "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .env(CONFIG_ENV, &path)
        .output()
        .unwrap();

    assert!(!output.status.success(), "child exited normally: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("call returned"), "{stdout}");

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "{output:?}");
    }
}

/// Runs in the child: call a managed function from an unattached thread
fn detached_call() {
    jbridge::init();
    assert!(jbridge::config::current().consistency.abort_on_detached);

    let vm = sandbox();
    let env = vm.attach_current_thread();
    let even = round_trip(&*env, NativeFn::from_fn(|x: i32| x % 2 == 0));

    let result = std::thread::spawn(move || even.call(2).is_ok()).join();
    println!("call returned {result:?}");
}
