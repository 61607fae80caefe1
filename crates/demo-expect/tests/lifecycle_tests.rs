//! Process lifecycle tests: shutdown strategies and reaping.

#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::{init_tracing, sh};
use demo_expect::prelude::*;

async fn spawn(config: SessionConfig) -> Session {
    init_tracing();
    Session::spawn_with_config(config).await.unwrap()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn close_leaves_no_zombie() {
    let mut session = spawn(sh("exec sleep 30").shutdown(ShutdownConfig::kill())).await;
    let pid = session.pid().unwrap();
    assert!(common::process_exists(pid));

    let status = session.close().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::Kill.as_signal_number()));
    assert!(!common::process_exists(pid), "pid {pid} still in the process table");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn drop_kills_and_reaps() {
    let session = spawn(sh("exec sleep 30")).await;
    let pid = session.pid().unwrap();
    drop(session);

    let deadline = Instant::now() + Duration::from_secs(2);
    while common::process_exists(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!common::process_exists(pid), "pid {pid} outlived its session");
}

#[tokio::test]
async fn graceful_close_sends_exit_command() {
    let script = "while IFS= read -r line; do [ \"$line\" = x ] && exit 7; done; exit 1";
    let config = sh(script).shutdown(ShutdownConfig::graceful().with_exit_command("x"));
    let mut session = spawn(config).await;

    assert_eq!(session.close().await.unwrap(), ProcessExitStatus::Exited(7));
}

#[tokio::test]
async fn graceful_close_kills_stubborn_child() {
    let mut config = sh("trap '' TERM; exec sleep 30").shutdown(ShutdownConfig::graceful());
    config.timeout = config.timeout.close(Duration::from_millis(200));
    let mut session = spawn(config).await;

    let status = session.close().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::Kill.as_signal_number()));
}

#[tokio::test]
async fn escalation_reaches_sigterm() {
    let mut config = sh("exec sleep 30");
    config.timeout = config.timeout.close(Duration::from_millis(200));
    let mut session = spawn(config).await;

    let started = Instant::now();
    let status = session.close().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::Terminate.as_signal_number()));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn escalation_reaches_sigkill() {
    let script = "trap '' TERM; echo armed; while :; do sleep 0.05; done";
    let mut config = sh(script).shutdown(
        ShutdownConfig::new(ShutdownStrategy::Escalating)
            .with_terminate_timeout(Duration::from_millis(200)),
    );
    config.timeout = config.timeout.close(Duration::from_millis(200));
    let mut session = spawn(config).await;
    session.expect("armed").await.unwrap();

    let status = session.close().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::Kill.as_signal_number()));
}

#[tokio::test]
async fn close_after_exit_returns_recorded_status() {
    let mut session = spawn(sh("exit 5")).await;
    assert_eq!(session.wait().await.unwrap(), ProcessExitStatus::Exited(5));
    assert_eq!(session.close().await.unwrap(), ProcessExitStatus::Exited(5));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn terminate_handle_is_inert_after_reap() {
    let mut session = spawn(sh("exit 0")).await;
    let handle = session.terminate_handle();
    assert!(!handle.is_reaped());

    session.wait().await.unwrap();
    assert!(handle.is_reaped());
    handle.kill().unwrap();
}
