//! Integration tests for `Session` against real `/bin/sh` children.

#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::{HELLO_CLIENT, init_tracing, sh, sh_quick_close, spawn_sh};
use demo_expect::prelude::*;
use demo_expect::{BufferConfig, OverflowPolicy};

#[tokio::test]
async fn hello_world_then_timeout_on_unknown_command() {
    let mut client = spawn_sh(HELLO_CLIENT).await;

    client.send_line("i").await.unwrap();
    let m = client.expect("Hello World!").await.unwrap();
    assert_eq!(m.matched, "Hello World!");

    client.send_line("?").await.unwrap();
    let err = client
        .expect_timeout("Hello World!", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(err.buffer().unwrap().contains("unknown command: ?"));

    client.send_line("x").await.unwrap();
    let status = client.wait_success().await.unwrap();
    assert_eq!(status, ProcessExitStatus::Exited(0));
    assert_eq!(client.close().await.unwrap(), status);
}

#[tokio::test]
async fn consumption_is_monotonic() {
    let mut session = spawn_sh("printf '..P1..P1..P2..'").await;

    let first = session.expect("P1").await.unwrap();
    assert_eq!(first.before, "..");

    let second = session.expect("P2").await.unwrap();
    assert_eq!(second.matched, "P2");
    assert_eq!(second.before, "..P1..");
    assert_eq!(session.buffer(), "..");
}

#[tokio::test]
async fn regex_captures_are_reported() {
    let mut session = spawn_sh("echo 'adapter ready on port 10000'").await;
    let m = session.expect_regex(r".* ready on port (\d+)").await.unwrap();
    assert_eq!(m.capture(0), Some("10000"));
    assert_eq!(m.after, "\n");
}

#[tokio::test]
async fn exit_without_pattern_is_end_of_output() {
    let mut session = spawn_sh("printf partial; exit 3").await;

    let started = Instant::now();
    let err = session
        .expect_timeout("never", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.is_eof(), "unexpected error: {err}");
    assert_eq!(err.buffer(), Some("partial"));
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(session.wait().await.unwrap(), ProcessExitStatus::Exited(3));
    assert_eq!(session.state(), SessionState::Exited(ProcessExitStatus::Exited(3)));
}

#[tokio::test]
async fn grandchild_holding_output_does_not_stall_eof() {
    let mut session = spawn_sh("sleep 3 & printf partial; exit 0").await;

    let started = Instant::now();
    let err = session
        .expect_timeout("never", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.is_eof(), "unexpected error: {err}");
    assert!(started.elapsed() < Duration::from_secs(2));
    session.close().await.unwrap();
}

#[tokio::test]
async fn wait_success_checks_status() {
    let mut ok = spawn_sh("exit 0").await;
    assert!(ok.wait_success().await.unwrap().success());

    let mut failing = spawn_sh("echo failing; exit 4").await;
    let err = failing.wait_success().await.unwrap_err();
    match err {
        ExpectError::UnexpectedExitStatus { actual, .. } => {
            assert_eq!(actual, ProcessExitStatus::Exited(4));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn wait_for_exit_with_sentinel() {
    let mut session = spawn_sh("echo 'test passed'; exit 0").await;
    let status = session
        .wait_for_exit(
            ExitExpectation::success()
                .sentinel("passed")
                .unwrap()
                .timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn string_patterns_are_regexes() {
    let mut server = spawn_sh("echo 'Hello adapter ready'; exec sleep 5").await;
    let m = server
        .expect_timeout(".* ready", Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(m.matched, "Hello adapter ready");
    server.close().await.unwrap();

    let mut client = spawn_sh("echo 'test passed'; exit 0").await;
    let status = client
        .wait_for_exit(ExitExpectation::success().sentinel(".* passed").unwrap())
        .await
        .unwrap();
    assert!(status.success());

    let mut session = spawn_sh("echo 'a.c'").await;
    let err = session.expect("(unclosed").await.unwrap_err();
    assert!(matches!(err, ExpectError::Regex(_)));
    assert!(session.expect(Pattern::literal("a.c")).await.is_ok());
}

#[tokio::test]
async fn wait_for_exit_times_out() {
    init_tracing();
    let mut session = Session::spawn_with_config(sh_quick_close("exec sleep 5"))
        .await
        .unwrap();
    let err = session
        .wait_for_exit(ExitExpectation::any().timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    session.close().await.unwrap();
}

#[tokio::test]
async fn timeout_fires_near_the_bound() {
    init_tracing();
    let mut session = Session::spawn_with_config(sh_quick_close("sleep 3; echo late"))
        .await
        .unwrap();

    let bound = Duration::from_millis(300);
    let started = Instant::now();
    let err = session.expect_timeout("late", bound).await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        ExpectError::Timeout { duration, .. } => assert_eq!(duration, bound),
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= bound, "returned early after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "returned late after {elapsed:?}");
    session.close().await.unwrap();
}

#[tokio::test]
async fn write_after_child_closed_input_is_broken_pipe() {
    init_tracing();
    let mut session = Session::spawn_with_config(sh_quick_close("exec 0<&-; echo closed; sleep 5"))
        .await
        .unwrap();
    session.expect("closed").await.unwrap();

    let err = session.send_line("hello").await.unwrap_err();
    assert!(err.is_broken_pipe(), "unexpected error: {err}");
    session.close().await.unwrap();
}

#[tokio::test]
async fn operations_after_close_are_invalid() {
    let mut session = spawn_sh("exec cat").await;
    let status = session.close().await.unwrap();
    assert_eq!(status, ProcessExitStatus::Exited(0));
    assert_eq!(session.state(), SessionState::Closed);

    assert!(matches!(
        session.send_line("x").await,
        Err(ExpectError::InvalidState { .. })
    ));
    assert!(matches!(
        session.expect("x").await,
        Err(ExpectError::InvalidState { .. })
    ));
    assert!(matches!(
        session.wait().await,
        Err(ExpectError::InvalidState { .. })
    ));
    assert_eq!(session.close().await.unwrap(), status);
}

#[tokio::test]
async fn send_after_exit_is_invalid() {
    let mut session = spawn_sh("exit 0").await;
    session.wait().await.unwrap();
    let err = session.send_line("late").await.unwrap_err();
    assert!(matches!(err, ExpectError::InvalidState { .. }));
}

#[tokio::test]
async fn stderr_is_merged_by_default() {
    let mut session = spawn_sh("echo out; echo err >&2").await;
    session.expect("out").await.unwrap();
    session.expect("err").await.unwrap();
}

#[tokio::test]
async fn stderr_can_be_kept_separate() {
    init_tracing();
    let config = sh("echo err >&2; echo out").stderr(StderrMode::Separate);
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let eof = session.expect_eof().await.unwrap();
    assert_eq!(eof.before, "out\n");
    assert_eq!(session.stderr_output(), "err\n");
}

#[tokio::test]
async fn stderr_can_be_discarded() {
    init_tracing();
    let config = sh("echo err >&2; echo out").stderr(StderrMode::Discard);
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let eof = session.expect_eof().await.unwrap();
    assert_eq!(eof.before, "out\n");
    assert_eq!(session.stderr_output(), "");
}

#[tokio::test]
async fn expect_any_picks_earliest_alternative() {
    let mut session = spawn_sh("echo 'status: error'").await;

    let mut patterns = PatternSet::new();
    patterns
        .add(Pattern::literal("success"))
        .add(Pattern::regex("err(or)?").unwrap())
        .add(Pattern::eof());
    let m = session.expect_any(&patterns).await.unwrap();
    assert_eq!(m.pattern_index, 1);
    assert_eq!(m.before, "status: ");
}

#[tokio::test]
async fn expect_any_reports_eof_alternative() {
    let mut session = spawn_sh("printf tail").await;

    let patterns = PatternSet::from_patterns(vec![Pattern::literal("never"), Pattern::eof()]);
    let m = session.expect_any(&patterns).await.unwrap();
    assert_eq!(m.pattern_index, 1);
    assert_eq!(m.before, "tail");
    assert!(session.is_eof());
}

#[tokio::test]
async fn expect_any_reports_timeout_alternative() {
    init_tracing();
    let mut session = Session::spawn_with_config(sh_quick_close("echo waiting; exec sleep 5"))
        .await
        .unwrap();

    let patterns = PatternSet::from_patterns(vec![
        Pattern::literal("never"),
        Pattern::timeout(Duration::from_millis(200)),
    ]);
    let started = Instant::now();
    let m = session.expect_any(&patterns).await.unwrap();
    assert_eq!(m.pattern_index, 1);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(m.after.contains("waiting"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn absence_assertions() {
    let mut client = spawn_sh(HELLO_CLIENT).await;

    client.send_line("?").await.unwrap();
    client
        .expect_absent("Hello World!", Duration::from_millis(500))
        .await
        .unwrap();

    client.send_line("i").await.unwrap();
    let err = client
        .expect_absent("Hello World!", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::UnexpectedMatch { .. }));

    client.send_line("x").await.unwrap();
    client.wait_success().await.unwrap();
}

#[tokio::test]
async fn outcomes_are_values() {
    let mut client = spawn_sh(HELLO_CLIENT).await;

    client.send_line("i").await.unwrap();
    let matched = client
        .expect_outcome("Hello", Duration::from_secs(2))
        .await
        .unwrap();
    assert!(matched.is_match());

    let timed_out = client
        .expect_outcome("Hello", Duration::from_millis(200))
        .await
        .unwrap();
    assert!(timed_out.is_timeout());

    client.send_line("x").await.unwrap();
    let ended = client
        .expect_outcome("Hello", Duration::from_secs(2))
        .await
        .unwrap();
    assert!(ended.is_eof());
}

#[tokio::test]
async fn interrupt_lets_server_exit_cleanly() {
    let mut server = spawn_sh(
        "trap 'echo shutting down; exit 0' INT; echo 'adapter ready'; while :; do sleep 0.1; done",
    )
    .await;
    server.expect_regex(".* ready").await.unwrap();

    server.terminate(Signal::Interrupt).unwrap();
    server.expect("shutting down").await.unwrap();
    assert!(server.wait_success().await.unwrap().success());

    // The child is reaped, so further signals are ignored.
    server.terminate(Signal::Kill).unwrap();
}

#[tokio::test]
async fn terminate_handle_unblocks_wait() {
    let mut session = spawn_sh("exec sleep 30").await;
    let handle = session.terminate_handle();
    assert_eq!(handle.pid(), session.pid());

    let signaller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        handle.terminate().unwrap();
        handle
    });

    let started = Instant::now();
    let status = session
        .wait_for_exit(ExitExpectation::any().timeout(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(status, ProcessExitStatus::Signaled(Signal::Terminate.as_signal_number()));
    assert!(started.elapsed() < Duration::from_secs(5));

    let handle = signaller.join().unwrap();
    assert!(handle.is_reaped());
    handle.kill().unwrap();
}

#[tokio::test]
async fn environment_and_working_directory() {
    init_tracing();
    let dir = std::env::temp_dir().canonicalize().unwrap();
    let config = sh("echo \"value=$DEMO_VAR\"; pwd -P")
        .env("DEMO_VAR", "configured")
        .working_dir(&dir);
    let mut session = Session::spawn_with_config(config).await.unwrap();

    session.expect("value=configured").await.unwrap();
    session
        .expect(Pattern::literal(dir.to_str().unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn cleared_environment() {
    init_tracing();
    let config = SessionBuilder::new()
        .command("/bin/sh")
        .args(["-c", "echo \"home=[$HOME]\""])
        .clear_env()
        .build();
    let mut session = Session::spawn_with_config(config).await.unwrap();
    session.expect(Pattern::literal("home=[]")).await.unwrap();
}

#[tokio::test]
async fn spawn_failures_are_classified() {
    init_tracing();
    let err = Session::spawn("/definitely/not/a/program", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpectError::Spawn(SpawnError::CommandNotFound { .. })
    ));

    let err = Session::spawn_with_config(sh("true").working_dir("/definitely/not/a/dir"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpectError::Spawn(SpawnError::InvalidWorkingDir { .. })
    ));
}

#[tokio::test]
async fn spawn_command_line_splits_words() {
    init_tracing();
    let mut session = Session::spawn_command_line("/bin/sh -c 'echo \"two words\"'")
        .await
        .unwrap();
    session.expect("two words").await.unwrap();
}

#[tokio::test]
async fn crlf_line_endings() {
    init_tracing();
    let config = SessionConfig::new("/bin/cat").line_ending(LineEnding::CrLf);
    let mut session = Session::spawn_with_config(config).await.unwrap();
    session.send_line("a").await.unwrap();
    session.expect("a\r\n").await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn close_stdin_delivers_eof() {
    let mut session = spawn_sh("exec cat").await;
    session.send_str("last words").await.unwrap();
    session.close_stdin().unwrap();

    let eof = session.expect_eof().await.unwrap();
    assert_eq!(eof.before, "last words");
    assert!(session.wait_success().await.unwrap().success());
}

#[tokio::test]
async fn overflow_is_an_error_by_default() {
    init_tracing();
    let mut config = sh("printf 0123456789abcdefghij; exec sleep 5");
    config.buffer = BufferConfig::new(16);
    config.timeout = config.timeout.close(Duration::from_millis(300));
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let err = session.expect("never").await.unwrap_err();
    assert!(matches!(err, ExpectError::BufferOverflow { max_size: 16 }));
    session.close().await.unwrap();
}

#[tokio::test]
async fn overflow_leaves_no_gap_to_match_across() {
    init_tracing();
    let script = "printf AAAAAAAAAAAA; sleep 0.3; printf BBBBBBBB; sleep 0.5; printf CC; exec sleep 5";
    let mut config = sh(script);
    config.buffer = BufferConfig::new(16);
    config.timeout = config.timeout.close(Duration::from_millis(300));
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let err = session.expect("never").await.unwrap_err();
    assert!(matches!(err, ExpectError::BufferOverflow { max_size: 16 }));

    // "AC" would straddle the rejected chunk.
    let err = session
        .expect_timeout("AC", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::BufferOverflow { max_size: 16 }));
    assert_eq!(session.buffer(), "AAAAAAAAAAAA");

    session.clear_buffer();
    let m = session.expect("CC").await.unwrap();
    assert_eq!(m.before, "");
    session.close().await.unwrap();
}

#[tokio::test]
async fn huge_exit_drain_does_not_overflow() {
    init_tracing();
    let mut config = sh("exit 0");
    config.timeout = config.timeout.exit_drain(Duration::MAX);
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let err = session
        .expect_timeout("x", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.is_eof(), "unexpected error: {err}");
    assert_eq!(
        session.state(),
        SessionState::Exited(ProcessExitStatus::Exited(0))
    );
}

#[tokio::test]
async fn zero_timeout_sees_queued_output() {
    let mut server = spawn_sh("echo ready; exec sleep 5").await;
    let mut client = spawn_sh("echo late; exec sleep 5").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let m = server.expect_timeout("ready", Duration::ZERO).await.unwrap();
    assert_eq!(m.matched, "ready");

    let err = client
        .expect_absent("late", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectError::UnexpectedMatch { .. }));

    server.kill().unwrap();
    client.kill().unwrap();
}

#[tokio::test]
async fn overflow_can_discard_oldest() {
    init_tracing();
    let mut config = sh("printf 0123456789abcdefghij");
    config.buffer = BufferConfig::new(16).overflow(OverflowPolicy::DiscardOldest);
    let mut session = Session::spawn_with_config(config).await.unwrap();

    let m = session.expect("ghij").await.unwrap();
    assert_eq!(m.before, "456789abcdef");
}

#[tokio::test]
async fn transcript_records_traffic() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("demo-expect-session-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let config = SessionConfig::new("/bin/cat");
    let mut session = SessionBuilder::from_config(config)
        .log_to_file(&path)
        .spawn()
        .await
        .unwrap();
    session.send_line("ping").await.unwrap();
    session.expect("ping").await.unwrap();
    session.close().await.unwrap();

    let transcript = std::fs::read_to_string(&path).unwrap();
    assert_eq!(transcript, "ping\nping\n");
    let _ = std::fs::remove_file(&path);
}
