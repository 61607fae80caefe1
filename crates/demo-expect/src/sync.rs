//! Synchronous wrapper for async expect operations.
//!
//! This module provides a blocking API for demo scripts and tests that do
//! not run inside an async runtime. Each [`SyncSession`] owns a
//! current-thread runtime, so several sessions can be driven from separate
//! threads without sharing anything.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::SessionConfig;
use crate::error::{ExpectError, Result};
use crate::expect::{IntoPattern, PatternSet};
use crate::session::{ExitExpectation, Session, Signal, TerminateHandle};
use crate::types::{ControlChar, ExpectResult, Match, ProcessExitStatus, SessionId, SessionState};

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExpectError::io_context("creating tokio runtime", e))
}

/// A synchronous session wrapper.
///
/// This wraps an async [`Session`] and provides blocking methods. Dropping
/// it closes the session.
///
/// ```no_run
/// use std::time::Duration;
/// use demo_expect::SyncSession;
///
/// # fn demo() -> demo_expect::Result<()> {
/// let mut client = SyncSession::spawn("./client", &[])?;
/// client.send_line("i")?;
/// client.expect("Hello World!")?;
/// client.send_line("x")?;
/// client.wait_success()?;
/// # Ok(())
/// # }
/// ```
pub struct SyncSession {
    /// The inner async session.
    inner: Session,
    /// The tokio runtime.
    runtime: Runtime,
}

impl SyncSession {
    /// Spawn a command and create a session.
    ///
    /// # Errors
    ///
    /// Returns an error if spawning fails.
    pub fn spawn(command: &str, args: &[&str]) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(Session::spawn(command, args))?;
        Ok(Self { inner, runtime })
    }

    /// Spawn a command line (see [`crate::split_command_line`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the line is invalid or spawning fails.
    pub fn spawn_command_line(line: &str) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(Session::spawn_command_line(line))?;
        Ok(Self { inner, runtime })
    }

    /// Spawn with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if spawning fails.
    pub fn spawn_with_config(config: SessionConfig) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(Session::spawn_with_config(config))?;
        Ok(Self { inner, runtime })
    }

    /// Get the session ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.inner.id()
    }

    /// Get the child process ID.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Exit status, once the child has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ProcessExitStatus> {
        self.inner.exit_status()
    }

    /// Get the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        self.inner.config()
    }

    /// Whether the end of the child's output has been reached.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }

    /// Get the unconsumed output.
    #[must_use]
    pub fn buffer(&self) -> String {
        self.inner.buffer()
    }

    /// Clear the buffer.
    pub fn clear_buffer(&mut self) {
        self.inner.clear_buffer();
    }

    /// Stderr collected under [`crate::StderrMode::Separate`].
    #[must_use]
    pub fn stderr_output(&self) -> String {
        self.inner.stderr_output()
    }

    /// Send bytes to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.runtime.block_on(self.inner.send(data))
    }

    /// Send a string to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send_str(&mut self, s: &str) -> Result<()> {
        self.runtime.block_on(self.inner.send_str(s))
    }

    /// Send a line to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.runtime.block_on(self.inner.send_line(line))
    }

    /// Send a control character.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send_control(&mut self, ctrl: ControlChar) -> Result<()> {
        self.runtime.block_on(self.inner.send_control(ctrl))
    }

    /// Close the child's input stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is no longer running.
    pub fn close_stdin(&mut self) -> Result<()> {
        self.inner.close_stdin()
    }

    /// Expect a pattern in the output. Strings are regular expressions.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or end of output, or for an invalid
    /// expression.
    pub fn expect(&mut self, pattern: impl IntoPattern) -> Result<Match> {
        self.runtime.block_on(self.inner.expect(pattern))
    }

    /// Expect a pattern with a specific timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or end of output.
    pub fn expect_timeout(
        &mut self,
        pattern: impl IntoPattern,
        timeout: Duration,
    ) -> Result<Match> {
        self.runtime
            .block_on(self.inner.expect_timeout(pattern, timeout))
    }

    /// Expect a regular expression.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid expression, on timeout or end of output.
    pub fn expect_regex(&mut self, regex: &str) -> Result<Match> {
        self.runtime.block_on(self.inner.expect_regex(regex))
    }

    /// Expect any of several patterns.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or end of output.
    pub fn expect_any(&mut self, patterns: &PatternSet) -> Result<Match> {
        self.runtime.block_on(self.inner.expect_any(patterns))
    }

    /// Expect any of several patterns with a specific timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or end of output.
    pub fn expect_any_timeout(&mut self, patterns: &PatternSet, timeout: Duration) -> Result<Match> {
        self.runtime
            .block_on(self.inner.expect_any_timeout(patterns, timeout))
    }

    /// Expect end of output.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout.
    pub fn expect_eof(&mut self) -> Result<Match> {
        self.runtime.block_on(self.inner.expect_eof())
    }

    /// Expect a pattern, reporting timeout and end of output as values.
    ///
    /// # Errors
    ///
    /// Returns errors other than timeout and end of output.
    pub fn expect_outcome(
        &mut self,
        pattern: impl IntoPattern,
        timeout: Duration,
    ) -> Result<ExpectResult> {
        self.runtime
            .block_on(self.inner.expect_outcome(pattern, timeout))
    }

    /// Assert that a pattern does not appear within `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::UnexpectedMatch`] if it appears.
    pub fn expect_absent(&mut self, pattern: impl IntoPattern, window: Duration) -> Result<()> {
        self.runtime
            .block_on(self.inner.expect_absent(pattern, window))
    }

    /// Wait for the child to exit.
    ///
    /// # Errors
    ///
    /// See [`Session::wait_for_exit`].
    pub fn wait_for_exit(&mut self, expectation: ExitExpectation) -> Result<ProcessExitStatus> {
        self.runtime
            .block_on(self.inner.wait_for_exit(expectation))
    }

    /// Wait for the child to exit successfully.
    ///
    /// # Errors
    ///
    /// See [`Session::wait_for_exit`].
    pub fn wait_success(&mut self) -> Result<ProcessExitStatus> {
        self.runtime.block_on(self.inner.wait_success())
    }

    /// Wait for the child to exit with any status.
    ///
    /// # Errors
    ///
    /// See [`Session::wait_for_exit`].
    pub fn wait(&mut self) -> Result<ProcessExitStatus> {
        self.runtime.block_on(self.inner.wait())
    }

    /// Send a signal to the child.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    pub fn terminate(&mut self, signal: Signal) -> Result<()> {
        self.inner.terminate(signal)
    }

    /// Kill the child.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill fails.
    pub fn kill(&mut self) -> Result<()> {
        self.inner.kill()
    }

    /// A handle that can signal the child from another thread.
    #[must_use]
    pub fn terminate_handle(&self) -> TerminateHandle {
        self.inner.terminate_handle()
    }

    /// Shut the child down and reap it.
    ///
    /// # Errors
    ///
    /// See [`Session::close`].
    pub fn close(&mut self) -> Result<ProcessExitStatus> {
        self.runtime.block_on(self.inner.close())
    }

    /// Run an async operation on this session's runtime.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T>,
    {
        self.runtime.block_on(future)
    }

    /// Borrow the inner async session.
    #[must_use]
    pub const fn inner(&self) -> &Session {
        &self.inner
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.block_on(self.inner.close()) {
            tracing::debug!(session = %self.inner.id(), error = %e, "close on drop failed");
        }
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// Run a future to completion on a fresh current-thread runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    Ok(runtime()?.block_on(future))
}
