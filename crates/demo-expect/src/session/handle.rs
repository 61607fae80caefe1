//! Session handle for interacting with spawned processes.
//!
//! This module provides the main `Session` type that users interact with
//! to control spawned processes, send input, and expect output.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use super::lifecycle::{ExitExpectation, ShutdownStrategy, Signal, TerminateHandle};
use crate::backend::{OutputChunk, ProcessEvent, ProcessHandle, ProcessSpawner, StreamKind};
use crate::config::{BufferConfig, LoggingConfig, OverflowPolicy, SessionConfig, StderrMode};
use crate::error::{ExpectError, Result};
use crate::expect::{ExpectState, IntoPattern, Matcher, OutputBuffer, Pattern, PatternSet};
use crate::types::{ControlChar, ExpectResult, Match, ProcessExitStatus, SessionId, SessionState};
use crate::util::{Deadline, TimeoutExt};

/// Reap attempts made when a session is dropped without `close`.
const DROP_REAP_ATTEMPTS: u32 = 10;

/// Pause between drop-time reap attempts.
const DROP_REAP_INTERVAL: Duration = Duration::from_millis(5);

/// Pattern text used in errors from exit waits.
const EXIT_PATTERN: &str = "<process exit>";

/// A session driving one spawned child process.
///
/// The session owns the child, its input stream and the reader tasks that
/// collect its output. Each [`expect`](Self::expect) searches the output
/// received since the previous match and consumes it up to the end of the
/// new match.
///
/// # Example
///
/// ```no_run
/// use demo_expect::Session;
///
/// # async fn demo() -> demo_expect::Result<()> {
/// let mut session = Session::spawn("./client", &[]).await?;
/// session.send_line("i").await?;
/// session.expect("Hello World!").await?;
/// session.send_line("x").await?;
/// session.wait_success().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    process: ProcessHandle,
    matcher: Matcher,
    stderr: OutputBuffer,
    state: SessionState,
    /// Every captured stream has closed.
    streams_closed: bool,
    /// No more output will be considered for matching.
    eof: bool,
    exit_status: Option<ProcessExitStatus>,
    /// Trailing output is collected until this instant after exit.
    drain_until: Option<Instant>,
    reaped: Arc<AtomicBool>,
    transcript: Transcript,
}

impl Session {
    /// Spawn `command` with `args` using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Spawn`] if the program cannot be started.
    pub async fn spawn(command: &str, args: &[&str]) -> Result<Self> {
        Self::spawn_with_config(SessionConfig::new(command).args(args.iter().copied())).await
    }

    /// Spawn a whitespace-separated command line. Single and double quotes
    /// group words; a backslash escapes the next character.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is empty, has an unterminated quote, or
    /// the program cannot be started.
    pub async fn spawn_command_line(line: &str) -> Result<Self> {
        let mut words = super::builder::split_command_line(line)?;
        let command = words.remove(0);
        Self::spawn_with_config(SessionConfig::new(command).args(words)).await
    }

    /// Spawn the program described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the transcript file
    /// cannot be opened, or the program cannot be started.
    pub async fn spawn_with_config(config: SessionConfig) -> Result<Self> {
        let transcript = Transcript::open(&config.logging)?;
        let process = ProcessSpawner::new(&config).spawn()?;

        let mut session = Self {
            id: SessionId::new(),
            matcher: Matcher::new(config.buffer),
            stderr: OutputBuffer::new(
                BufferConfig::new(config.buffer.max_size).overflow(OverflowPolicy::DiscardOldest),
            ),
            config,
            process,
            state: SessionState::Starting,
            streams_closed: false,
            eof: false,
            exit_status: None,
            drain_until: None,
            reaped: Arc::new(AtomicBool::new(false)),
            transcript,
        };
        session.state = SessionState::Running;
        tracing::debug!(session = %session.id, pid = ?session.pid(), "session running");
        Ok(session)
    }

    /// Get the session ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The child's process id.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Exit status, once the child has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ProcessExitStatus> {
        self.exit_status
    }

    /// Whether the end of the child's output has been reached.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Get the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Output received but not yet consumed by a match.
    #[must_use]
    pub fn buffer(&self) -> String {
        self.matcher.buffer_str()
    }

    /// Discard unconsumed output. After a [`ExpectError::BufferOverflow`]
    /// this also lets the session match new output again.
    pub fn clear_buffer(&mut self) {
        self.matcher.clear();
    }

    /// Stderr collected under [`StderrMode::Separate`].
    #[must_use]
    pub fn stderr_output(&self) -> String {
        self.stderr.to_string_lossy()
    }

    /// A handle that can signal the child from another thread.
    #[must_use]
    pub fn terminate_handle(&self) -> TerminateHandle {
        TerminateHandle::new(self.pid(), Arc::clone(&self.reaped))
    }

    fn ensure_usable(&self, operation: &'static str) -> Result<()> {
        if self.state.is_usable() {
            Ok(())
        } else {
            Err(ExpectError::invalid_state(operation, self.state))
        }
    }

    /// Send bytes to the process and flush them.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::BrokenPipe`] if the child's input is closed and
    /// [`ExpectError::InvalidState`] if the session is closed or exited.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_usable("send")?;
        self.write_raw(data).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self
            .process
            .stdin()
            .ok_or_else(|| ExpectError::broken_pipe("writing to child stdin"))?;
        stdin
            .write_all(data)
            .await
            .map_err(|e| ExpectError::from_write("writing to child stdin", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| ExpectError::from_write("flushing child stdin", e))?;

        tracing::trace!(session = %self.id, bytes = data.len(), "sent");
        self.transcript.sent(data);
        Ok(())
    }

    /// Send a string to the process.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_str(&mut self, s: &str) -> Result<()> {
        self.send(s.as_bytes()).await
    }

    /// Send a line to the process (appends the configured line ending).
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let data = format!("{line}{}", self.config.line_ending.as_str());
        self.send(data.as_bytes()).await
    }

    /// Send a control character to the process.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_control(&mut self, ctrl: ControlChar) -> Result<()> {
        self.send(&[ctrl.as_byte()]).await
    }

    /// Close the child's input stream so it reads end-of-file.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::InvalidState`] if the session is closed or exited.
    pub fn close_stdin(&mut self) -> Result<()> {
        self.ensure_usable("close stdin")?;
        if self.process.close_stdin() {
            tracing::debug!(session = %self.id, "closed child stdin");
        }
        Ok(())
    }

    /// Expect a pattern using the default timeout.
    ///
    /// Plain strings are regular expressions, so `".* ready"` matches a
    /// whole readiness line; use [`Pattern::literal`] to match text exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Timeout`] if the pattern does not appear in
    /// time, [`ExpectError::EndOfOutput`] if the output ends first,
    /// [`ExpectError::Regex`] for an invalid expression and
    /// [`ExpectError::BufferOverflow`] once output has been rejected for
    /// lack of space (until [`clear_buffer`](Self::clear_buffer)).
    pub async fn expect(&mut self, pattern: impl IntoPattern) -> Result<Match> {
        let timeout = self.config.timeout.default;
        self.expect_timeout(pattern, timeout).await
    }

    /// Expect a pattern with a specific timeout.
    ///
    /// # Errors
    ///
    /// See [`expect`](Self::expect).
    pub async fn expect_timeout(
        &mut self,
        pattern: impl IntoPattern,
        timeout: Duration,
    ) -> Result<Match> {
        let patterns = PatternSet::from(pattern.into_pattern()?);
        self.expect_any_timeout(&patterns, timeout).await
    }

    /// Expect a regular expression using the default timeout. Same as
    /// [`expect`](Self::expect) with a string.
    ///
    /// # Errors
    ///
    /// See [`expect`](Self::expect).
    pub async fn expect_regex(&mut self, regex: &str) -> Result<Match> {
        self.expect(regex).await
    }

    /// Expect any of several patterns using the default timeout.
    ///
    /// The alternative whose match starts earliest wins; on a tie the lower
    /// index wins. [`Pattern::Eof`] and [`Pattern::Timeout`] entries turn
    /// end-of-output and timeout into matches of that index.
    ///
    /// # Errors
    ///
    /// See [`expect`](Self::expect).
    pub async fn expect_any(&mut self, patterns: &PatternSet) -> Result<Match> {
        let timeout = self.config.timeout.default;
        self.expect_any_timeout(patterns, timeout).await
    }

    /// Expect any of several patterns with a specific timeout.
    ///
    /// # Errors
    ///
    /// See [`expect`](Self::expect).
    pub async fn expect_any_timeout(
        &mut self,
        patterns: &PatternSet,
        timeout: Duration,
    ) -> Result<Match> {
        self.ensure_usable("expect")?;
        self.run_expect(patterns, timeout).await
    }

    /// Expect end of output (the child closed its streams or exited).
    ///
    /// The unconsumed output is returned in [`Match::before`].
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Timeout`] if output does not end in time.
    pub async fn expect_eof(&mut self) -> Result<Match> {
        self.expect(Pattern::eof()).await
    }

    /// Expect end of output with a specific timeout.
    ///
    /// # Errors
    ///
    /// See [`expect_eof`](Self::expect_eof).
    pub async fn expect_eof_timeout(&mut self, timeout: Duration) -> Result<Match> {
        self.expect_timeout(Pattern::eof(), timeout).await
    }

    /// Expect a pattern, reporting timeout and end of output as values.
    ///
    /// # Errors
    ///
    /// Only errors other than timeout and end of output are returned.
    pub async fn expect_outcome(
        &mut self,
        pattern: impl IntoPattern,
        timeout: Duration,
    ) -> Result<ExpectResult> {
        match self.expect_timeout(pattern, timeout).await {
            Ok(m) => Ok(ExpectResult::Matched(m)),
            Err(ExpectError::Timeout {
                duration, buffer, ..
            }) => Ok(ExpectResult::Timeout { duration, buffer }),
            Err(ExpectError::EndOfOutput { buffer, .. }) => Ok(ExpectResult::Eof { buffer }),
            Err(e) => Err(e),
        }
    }

    /// Assert that `pattern` does not appear within `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::UnexpectedMatch`] if the pattern appears and
    /// [`ExpectError::EndOfOutput`] if the output ends inside the window.
    pub async fn expect_absent(
        &mut self,
        pattern: impl IntoPattern,
        window: Duration,
    ) -> Result<()> {
        let pattern = pattern.into_pattern()?;
        let description = pattern.to_string();
        match self.expect_timeout(pattern, window).await {
            Ok(m) => Err(ExpectError::UnexpectedMatch {
                pattern: description,
                matched: m.matched,
            }),
            Err(e) if e.is_timeout() => {
                tracing::debug!(session = %self.id, pattern = %description, "pattern absent as expected");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run_expect(&mut self, patterns: &PatternSet, timeout: Duration) -> Result<Match> {
        let state = ExpectState::new(patterns, timeout);

        loop {
            self.ensure_contiguous()?;
            if let Some(m) = self.consume_first_match(patterns) {
                return Ok(m);
            }

            if self.eof {
                if let Some(index) = state.eof_index() {
                    tracing::debug!(session = %self.id, "end of output matched");
                    return Ok(self.matcher.consume_all(index));
                }
                if let Some(status) = self.exit_status {
                    self.state = SessionState::Exited(status);
                }
                return Err(ExpectError::end_of_output(
                    state.describe(),
                    self.matcher.buffer_str(),
                    self.exit_status,
                ));
            }

            if state.is_timed_out() {
                // Output queued before the deadline still counts.
                if self.ingest_ready()? {
                    if let Some(m) = self.consume_first_match(patterns) {
                        return Ok(m);
                    }
                }
                if let Some(index) = state.timeout_index() {
                    tracing::debug!(session = %self.id, "timeout pattern matched");
                    return Ok(Match::new(index, "", "", self.matcher.buffer_str()));
                }
                tracing::debug!(
                    session = %self.id,
                    pattern = %state.describe(),
                    elapsed = ?state.deadline().elapsed(),
                    "expect timed out"
                );
                return Err(ExpectError::timeout(
                    state.timeout(),
                    state.describe(),
                    self.matcher.buffer_str(),
                ));
            }

            self.read_event(state.deadline()).await?;
        }
    }

    fn ensure_contiguous(&self) -> Result<()> {
        let buffer = self.matcher.buffer();
        if buffer.is_overflowed() {
            Err(ExpectError::buffer_overflow(buffer.max_size()))
        } else {
            Ok(())
        }
    }

    fn consume_first_match(&mut self, patterns: &PatternSet) -> Option<Match> {
        let result = self.matcher.try_match_any(patterns)?;
        let m = self.matcher.consume_match(&result);
        tracing::debug!(
            session = %self.id,
            pattern_index = m.pattern_index,
            matched = %m.matched,
            "pattern matched"
        );
        Some(m)
    }

    /// Fold already-queued output into the buffers. Returns whether any arrived.
    fn ingest_ready(&mut self) -> Result<bool> {
        let chunks = self.process.ready_output();
        for chunk in &chunks {
            self.ingest(chunk)?;
        }
        Ok(!chunks.is_empty())
    }

    /// Wait for one event bounded by `deadline` and fold it into session state.
    async fn read_event(&mut self, deadline: &Deadline) -> Result<()> {
        let until = self
            .drain_until
            .map_or(deadline.instant(), |drain| drain.min(deadline.instant()));
        let event = self
            .process
            .next_event(until, !self.streams_closed, self.exit_status.is_none())
            .await;

        match event {
            ProcessEvent::Output(chunk) => self.ingest(&chunk)?,
            ProcessEvent::Closed => {
                self.streams_closed = true;
                self.eof = true;
                tracing::debug!(session = %self.id, "child output closed");
                if self.exit_status.is_none() {
                    let drain = self.config.timeout.exit_drain;
                    if let Ok(status) = self.process.wait().with_timeout(drain).await {
                        let status = status
                            .map_err(|e| ExpectError::io_context("waiting for child", e))?;
                        self.record_exit(status);
                    }
                }
            }
            ProcessEvent::Exited(status) => {
                let status = status.map_err(|e| ExpectError::io_context("waiting for child", e))?;
                self.record_exit(status);
            }
            ProcessEvent::Idle => {
                if self.drain_until.is_some_and(|drain| Instant::now() >= drain) {
                    tracing::debug!(session = %self.id, "output drain window elapsed");
                    self.eof = true;
                }
            }
        }
        Ok(())
    }

    fn ingest(&mut self, chunk: &OutputChunk) -> Result<()> {
        tracing::trace!(session = %self.id, stream = ?chunk.stream, bytes = chunk.data.len(), "received");
        self.transcript.received(&chunk.data);

        match (chunk.stream, self.config.stderr) {
            (StreamKind::Stdout, _) | (StreamKind::Stderr, StderrMode::Merge) => {
                self.matcher.append(&chunk.data)
            }
            (StreamKind::Stderr, StderrMode::Separate) => self.stderr.append(&chunk.data),
            (StreamKind::Stderr, StderrMode::Inherit | StderrMode::Discard) => Ok(()),
        }
    }

    fn record_exit(&mut self, status: std::process::ExitStatus) -> ProcessExitStatus {
        let status = ProcessExitStatus::from(status);
        self.exit_status = Some(status);
        self.reaped.store(true, Ordering::Release);
        if !self.eof && self.drain_until.is_none() {
            self.drain_until = Some(Deadline::from_now(self.config.timeout.exit_drain).instant());
        }
        tracing::debug!(session = %self.id, pid = ?self.pid(), %status, "child exited");
        status
    }

    /// Wait for the child to exit, collecting its output meanwhile.
    async fn wait_until(&mut self, deadline: &Deadline) -> Result<ProcessExitStatus> {
        loop {
            if let Some(status) = self.exit_status {
                return Ok(status);
            }
            let event = self
                .process
                .next_event(deadline.instant(), !self.streams_closed, true)
                .await;
            match event {
                ProcessEvent::Output(chunk) => self.ingest(&chunk)?,
                ProcessEvent::Closed => self.streams_closed = true,
                ProcessEvent::Exited(status) => {
                    let status = status.map_err(|e| ExpectError::io_context("waiting for child", e))?;
                    self.record_exit(status);
                }
                ProcessEvent::Idle => {
                    return Err(ExpectError::timeout(
                        deadline.budget(),
                        EXIT_PATTERN,
                        self.matcher.buffer_str(),
                    ));
                }
            }
        }
    }

    /// Wait for the child to exit, optionally after a sentinel pattern.
    ///
    /// The whole operation, sentinel included, is bounded by the
    /// expectation's timeout (or the session default).
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::UnexpectedExitStatus`] if success was required
    /// and the child failed, [`ExpectError::Timeout`] if the bound elapsed,
    /// and [`ExpectError::InvalidState`] after [`close`](Self::close).
    pub async fn wait_for_exit(&mut self, expectation: ExitExpectation) -> Result<ProcessExitStatus> {
        if matches!(self.state, SessionState::Closed | SessionState::Closing) {
            return Err(ExpectError::invalid_state("wait for exit", self.state));
        }
        let timeout = expectation.timeout.unwrap_or(self.config.timeout.default);
        let deadline = Deadline::from_now(timeout);

        if let Some(sentinel) = expectation.sentinel {
            let patterns = PatternSet::from(sentinel);
            self.run_expect(&patterns, deadline.remaining()).await?;
        }

        let status = self.wait_until(&deadline).await?;
        self.state = SessionState::Exited(status);

        if expectation.require_success && !status.success() {
            return Err(ExpectError::UnexpectedExitStatus {
                expected: "exit code 0".to_string(),
                actual: status,
                buffer: self.matcher.buffer_str(),
            });
        }
        Ok(status)
    }

    /// Wait for the child to exit successfully.
    ///
    /// # Errors
    ///
    /// See [`wait_for_exit`](Self::wait_for_exit).
    pub async fn wait_success(&mut self) -> Result<ProcessExitStatus> {
        self.wait_for_exit(ExitExpectation::success()).await
    }

    /// Wait for the child to exit with any status.
    ///
    /// # Errors
    ///
    /// See [`wait_for_exit`](Self::wait_for_exit).
    pub async fn wait(&mut self) -> Result<ProcessExitStatus> {
        self.wait_for_exit(ExitExpectation::any()).await
    }

    /// Send a signal to the child. A no-op once the child has been reaped.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Signal`] if delivery fails.
    pub fn terminate(&mut self, signal: Signal) -> Result<()> {
        if self.exit_status.is_some() {
            tracing::debug!(session = %self.id, %signal, "child already reaped; not signalling");
            return Ok(());
        }
        tracing::debug!(session = %self.id, pid = ?self.pid(), %signal, "signalling child");
        self.process.signal(signal)
    }

    /// Kill the child.
    ///
    /// # Errors
    ///
    /// See [`terminate`](Self::terminate).
    pub fn kill(&mut self) -> Result<()> {
        self.terminate(Signal::Kill)
    }

    /// Shut the child down, reap it and release its streams.
    ///
    /// Applies the configured [`ShutdownStrategy`]. Calling `close` again
    /// returns the same status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the OS fails while waiting for the child;
    /// the session is closed regardless.
    pub async fn close(&mut self) -> Result<ProcessExitStatus> {
        if self.state == SessionState::Closed {
            return Ok(self.exit_status.unwrap_or(ProcessExitStatus::Unknown));
        }
        self.state = SessionState::Closing;
        tracing::debug!(session = %self.id, strategy = ?self.config.shutdown.strategy, "closing session");

        let result = self.shutdown().await;
        self.process.close_stdin();
        self.process.stop_readers();
        self.streams_closed = true;
        self.eof = true;
        self.state = SessionState::Closed;
        result
    }

    async fn shutdown(&mut self) -> Result<ProcessExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let shutdown = self.config.shutdown.clone();
        let close_timeout = self.config.timeout.close;

        if shutdown.starts_gracefully() {
            if let Some(command) = &shutdown.exit_command {
                let line = format!("{command}{}", self.config.line_ending.as_str());
                if let Err(e) = self.write_raw(line.as_bytes()).await {
                    tracing::debug!(session = %self.id, error = %e, "could not send exit command");
                }
            }
            self.process.close_stdin();
            if let Some(status) = self.reap_within(close_timeout).await? {
                return Ok(status);
            }
            if shutdown.strategy == ShutdownStrategy::Graceful {
                tracing::warn!(session = %self.id, timeout = ?close_timeout, "child did not exit after stdin closed; killing");
                return self.force_kill().await;
            }
        } else {
            self.process.close_stdin();
        }

        if matches!(
            shutdown.strategy,
            ShutdownStrategy::Terminate | ShutdownStrategy::Escalating
        ) {
            match self.process.signal(Signal::Terminate) {
                Ok(()) => {
                    let grace = shutdown.terminate_timeout.unwrap_or(close_timeout);
                    if let Some(status) = self.reap_within(grace).await? {
                        return Ok(status);
                    }
                    tracing::warn!(session = %self.id, timeout = ?grace, "child ignored SIGTERM; killing");
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, error = %e, "SIGTERM failed; killing");
                }
            }
        }

        self.force_kill().await
    }

    /// Wait up to `limit` for the child to exit, draining output meanwhile.
    async fn reap_within(&mut self, limit: Duration) -> Result<Option<ProcessExitStatus>> {
        let deadline = Deadline::from_now(limit);
        loop {
            let event = self
                .process
                .next_event(deadline.instant(), !self.streams_closed, true)
                .await;
            match event {
                ProcessEvent::Output(chunk) => {
                    if let Err(e) = self.ingest(&chunk) {
                        tracing::debug!(session = %self.id, error = %e, "dropping output during shutdown");
                    }
                }
                ProcessEvent::Closed => self.streams_closed = true,
                ProcessEvent::Exited(status) => {
                    let status = status.map_err(|e| ExpectError::io_context("waiting for child", e))?;
                    return Ok(Some(self.record_exit(status)));
                }
                ProcessEvent::Idle => return Ok(None),
            }
        }
    }

    async fn force_kill(&mut self) -> Result<ProcessExitStatus> {
        if let Err(e) = self.process.start_kill() {
            tracing::warn!(session = %self.id, error = %e, "kill failed");
        }
        let status = self
            .process
            .wait()
            .await
            .map_err(|e| ExpectError::io_context("waiting for killed child", e))?;
        Ok(self.record_exit(status))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pid", &self.pid())
            .field("state", &self.state)
            .field("eof", &self.eof)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        tracing::warn!(session = %self.id, pid = ?self.pid(), "session dropped without close; killing child");
        if let Err(e) = self.process.start_kill() {
            tracing::debug!(session = %self.id, error = %e, "kill on drop failed");
            return;
        }
        // The runtime's orphan reaper collects the child if it is still
        // exiting after these attempts.
        for _ in 0..DROP_REAP_ATTEMPTS {
            match self.process.try_wait() {
                Ok(Some(status)) => {
                    self.exit_status = Some(status.into());
                    self.reaped.store(true, Ordering::Release);
                    return;
                }
                Ok(None) => std::thread::sleep(DROP_REAP_INTERVAL),
                Err(_) => return,
            }
        }
    }
}

/// Copy of the session's traffic, written to a file and/or echoed to stdout.
#[derive(Debug, Default)]
struct Transcript {
    file: Option<File>,
    echo: bool,
}

impl Transcript {
    fn open(config: &LoggingConfig) -> Result<Self> {
        let file = config
            .log_file
            .as_ref()
            .map(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        ExpectError::io_context(format!("opening transcript {}", path.display()), e)
                    })
            })
            .transpose()?;
        Ok(Self {
            file,
            echo: config.log_user,
        })
    }

    fn received(&mut self, data: &[u8]) {
        self.write_file(data);
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            if stdout.write_all(data).and_then(|()| stdout.flush()).is_err() {
                self.echo = false;
            }
        }
    }

    fn sent(&mut self, data: &[u8]) {
        self.write_file(data);
    }

    fn write_file(&mut self, data: &[u8]) {
        let failed = match &mut self.file {
            Some(file) => file.write_all(data).err(),
            None => None,
        };
        if let Some(e) = failed {
            tracing::warn!(error = %e, "transcript write failed; disabling transcript");
            self.file = None;
        }
    }
}
