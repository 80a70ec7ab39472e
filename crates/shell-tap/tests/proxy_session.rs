#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

//! End-to-end proxy sessions driven through the library API.

use std::fs;
use std::io;

use shell_tap::NativePtySpawner;
use shell_tap::ProxyConfig;
use shell_tap::ProxyDriver;
use shell_tap::ProxyOutcome;
use tempfile::TempDir;

fn config_in(dir: &TempDir, session_id: &str, shell: &str) -> ProxyConfig {
    ProxyConfig::from_env()
        .with_log_file(dir.path().join("proxy.log"))
        .with_session_id(session_id.to_string())
        .with_max_lines(50)
        .with_shell(shell.to_string())
}

#[test]
fn trivial_session_produces_session_log_and_releases_lock() {
    let tmp = TempDir::new().expect("temp dir");
    let driver = ProxyDriver::new(NativePtySpawner, config_in(&tmp, "e2e", "true"));

    let outcome = driver
        .run_with_io(Box::new(io::empty()), Box::new(io::sink()), None)
        .expect("proxy run");

    assert_eq!(outcome, ProxyOutcome::Completed);
    assert!(
        tmp.path().join("proxy.e2e.log").exists(),
        "session log should exist at the derived path"
    );
    assert!(
        !tmp.path().join("proxy.e2e.lock").exists(),
        "lock should be released after the session"
    );
}

#[test]
fn session_output_lands_normalized_in_the_transcript() {
    let tmp = TempDir::new().expect("temp dir");
    let driver = ProxyDriver::new(NativePtySpawner, config_in(&tmp, "echo", "echo"));

    let outcome = driver
        .run_with_io(Box::new(io::empty()), Box::new(io::sink()), None)
        .expect("proxy run");

    assert_eq!(outcome, ProxyOutcome::Completed);
    // echo emits a lone CRLF through the pty; the transcript records it as a
    // single empty line.
    let content = fs::read_to_string(tmp.path().join("proxy.echo.log")).expect("session log");
    assert_eq!(content, "\n");
}

#[test]
fn previous_session_log_is_replaced() {
    let tmp = TempDir::new().expect("temp dir");
    let stale = tmp.path().join("proxy.fresh.log");
    fs::write(&stale, "leftover from an earlier run\n").expect("seed stale log");

    let driver = ProxyDriver::new(NativePtySpawner, config_in(&tmp, "fresh", "true"));
    driver
        .run_with_io(Box::new(io::empty()), Box::new(io::sink()), None)
        .expect("proxy run");

    let content = fs::read_to_string(&stale).expect("session log");
    assert!(
        !content.contains("leftover"),
        "old transcript content must not survive a new session"
    );
}
