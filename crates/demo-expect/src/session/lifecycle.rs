//! Session lifecycle management.
//!
//! Signals, shutdown strategies, exit expectations and the cross-thread
//! termination handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{ExpectError, Result};
use crate::expect::{IntoPattern, Pattern};
use crate::types::ControlChar;

/// Shutdown strategy for closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownStrategy {
    /// Close stdin (after the exit command, if any) and wait for the child
    /// to exit on its own. A child still running after the close timeout is
    /// killed so it is always reaped.
    Graceful,
    /// Send SIGTERM (or equivalent) and wait, then kill.
    Terminate,
    /// Kill immediately.
    Kill,
    /// Try graceful, then terminate, then kill.
    #[default]
    Escalating,
}

/// Configuration for session shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShutdownConfig {
    /// The shutdown strategy to use.
    pub strategy: ShutdownStrategy,
    /// Line sent before stdin is closed during graceful shutdown.
    pub exit_command: Option<String>,
    /// How long to wait after SIGTERM before killing. Defaults to the
    /// session's close timeout.
    pub terminate_timeout: Option<Duration>,
}

impl ShutdownConfig {
    /// Create a config with the given strategy.
    #[must_use]
    pub fn new(strategy: ShutdownStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Create a new shutdown config with graceful strategy.
    #[must_use]
    pub fn graceful() -> Self {
        Self::new(ShutdownStrategy::Graceful)
    }

    /// Create a new shutdown config with kill strategy.
    #[must_use]
    pub fn kill() -> Self {
        Self::new(ShutdownStrategy::Kill)
    }

    /// Set the line sent before closing stdin, e.g. `"x"` for the demo
    /// clients that exit on that command.
    #[must_use]
    pub fn with_exit_command(mut self, command: impl Into<String>) -> Self {
        self.exit_command = Some(command.into());
        self
    }

    /// Set the SIGTERM grace period.
    #[must_use]
    pub const fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = Some(timeout);
        self
    }

    /// Whether this strategy begins by asking the child to exit on its own.
    #[must_use]
    pub const fn starts_gracefully(&self) -> bool {
        matches!(
            self.strategy,
            ShutdownStrategy::Graceful | ShutdownStrategy::Escalating
        )
    }
}

/// Signals that can be sent to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Interrupt (Ctrl+C).
    Interrupt,
    /// Quit (Ctrl+\).
    Quit,
    /// Terminate.
    Terminate,
    /// Kill (non-catchable).
    Kill,
    /// Hangup.
    Hangup,
}

impl Signal {
    /// Get the control character for this signal, if applicable.
    #[must_use]
    pub const fn as_control_char(self) -> Option<ControlChar> {
        match self {
            Self::Interrupt => Some(ControlChar::CtrlC),
            Self::Quit => Some(ControlChar::CtrlBackslash),
            _ => None,
        }
    }

    /// Get the Unix signal number for this signal.
    #[must_use]
    pub const fn as_signal_number(self) -> i32 {
        match self {
            Self::Interrupt => 2,
            Self::Quit => 3,
            Self::Terminate => 15,
            Self::Kill => 9,
            Self::Hangup => 1,
        }
    }

    /// Conventional signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
            Self::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What `wait_for_exit` requires of the child.
#[derive(Debug, Clone, Default)]
pub struct ExitExpectation {
    /// Pattern that must appear in the output before the child exits.
    pub sentinel: Option<Pattern>,
    /// Whether a non-zero exit (or death by signal) is an error.
    pub require_success: bool,
    /// Bound on the whole wait; `None` uses the session default timeout.
    pub timeout: Option<Duration>,
}

impl ExitExpectation {
    /// Accept any exit status.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Require exit status zero.
    #[must_use]
    pub fn success() -> Self {
        Self {
            require_success: true,
            ..Default::default()
        }
    }

    /// Require `pattern` to appear before the child exits. Strings are
    /// regular expressions, as with [`Session::expect`](crate::Session::expect).
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Regex`] if a string is not a valid expression.
    pub fn sentinel(mut self, pattern: impl IntoPattern) -> Result<Self> {
        self.sentinel = Some(pattern.into_pattern()?);
        Ok(self)
    }

    /// Bound the wait.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A cloneable handle for signalling a session's child from another thread.
///
/// Once the session has reaped its child the handle becomes inert, so a
/// recycled pid is never signalled.
#[derive(Debug, Clone)]
pub struct TerminateHandle {
    pid: Option<u32>,
    reaped: Arc<AtomicBool>,
}

impl TerminateHandle {
    pub(crate) const fn new(pid: Option<u32>, reaped: Arc<AtomicBool>) -> Self {
        Self { pid, reaped }
    }

    /// The child's pid.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the session has already reaped the child.
    #[must_use]
    pub fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }

    /// Send `signal` to the child. A no-op once the child has been reaped.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        if self.is_reaped() {
            tracing::debug!(%signal, "child already reaped; not signalling");
            return Ok(());
        }
        let pid = self
            .pid
            .ok_or_else(|| ExpectError::signal("child has no pid"))?;
        crate::backend::send_signal(pid, signal)
    }

    /// Send SIGTERM.
    pub fn terminate(&self) -> Result<()> {
        self.signal(Signal::Terminate)
    }

    /// Send SIGKILL.
    pub fn kill(&self) -> Result<()> {
        self.signal(Signal::Kill)
    }
}
