//! Common types for demo-expect.
//!
//! This module defines the values returned by expect operations and the
//! state a session moves through.

use std::fmt;
use std::time::Duration;

/// A match result from an expect operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The index of the pattern that matched (for multi-pattern expects).
    pub pattern_index: usize,

    /// The full text that matched.
    pub matched: String,

    /// Capture groups from regex patterns. Groups that did not participate
    /// in the match are reported as empty strings.
    pub captures: Vec<String>,

    /// Output consumed before the match.
    pub before: String,

    /// Output left in the buffer after the match.
    pub after: String,
}

impl Match {
    /// Create a new match result.
    #[must_use]
    pub fn new(
        pattern_index: usize,
        matched: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            pattern_index,
            matched: matched.into(),
            captures: Vec::new(),
            before: before.into(),
            after: after.into(),
        }
    }

    /// Create a match with captures.
    #[must_use]
    pub fn with_captures(mut self, captures: Vec<String>) -> Self {
        self.captures = captures;
        self
    }

    /// Get a capture group by index (0 is the first group, not the whole match).
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// Outcome of an expect call where end-of-output and timeout are values
/// rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectResult {
    /// A pattern matched.
    Matched(Match),

    /// Output ended before a match.
    Eof {
        /// Buffer contents when output ended.
        buffer: String,
    },

    /// Timeout occurred.
    Timeout {
        /// The duration that elapsed.
        duration: Duration,
        /// Buffer contents at timeout.
        buffer: String,
    },
}

impl ExpectResult {
    /// Check if this is a successful match.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check if this is an end-of-output outcome.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Check if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the match if this is a successful match.
    #[must_use]
    pub fn into_match(self) -> Option<Match> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }

    /// Get the buffer contents (for EOF or timeout).
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Eof { buffer } | Self::Timeout { buffer, .. } => Some(buffer),
            Self::Matched(_) => None,
        }
    }
}

/// The state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process has been created but the session is not yet wired up.
    Starting,

    /// Session is running and ready for operations.
    Running,

    /// Session is shutting the process down.
    Closing,

    /// Session has been closed and the process reaped.
    Closed,

    /// Process has exited with status.
    Exited(ProcessExitStatus),
}

impl SessionState {
    /// Check if the session accepts send/expect operations.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if the session is closed or exited.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Exited(_))
    }

    /// Get the exit status if the session has exited.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ProcessExitStatus> {
        if let Self::Exited(status) = *self {
            Some(status)
        } else {
            None
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Exited(status) => write!(f, "exited ({status})"),
        }
    }
}

/// Exit status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExitStatus {
    /// Process exited with a code.
    Exited(i32),

    /// Process was terminated by a signal (Unix).
    Signaled(i32),

    /// Exit status is unknown.
    Unknown,
}

impl ProcessExitStatus {
    /// Check if the process exited successfully (code 0).
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Get the signal number if the process was signaled.
    #[must_use]
    pub const fn signal(self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

impl From<std::process::ExitStatus> for ProcessExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return Self::Signaled(sig);
            }
        }

        Self::Unknown
    }
}

/// Control characters that can be sent to a child's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChar {
    /// Ctrl+C (ETX).
    CtrlC,
    /// Ctrl+D (EOT).
    CtrlD,
    /// Ctrl+Z (SUB).
    CtrlZ,
    /// Ctrl+\ (FS).
    CtrlBackslash,
    /// Escape.
    Escape,
    /// Any other Ctrl+letter combination, stored as its byte value.
    Other(u8),
}

impl ControlChar {
    /// Get the byte value of this control character.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::CtrlC => 0x03,
            Self::CtrlD => 0x04,
            Self::CtrlZ => 0x1A,
            Self::Escape => 0x1B,
            Self::CtrlBackslash => 0x1C,
            Self::Other(b) => b,
        }
    }

    /// Create a control character from the key pressed together with Ctrl.
    ///
    /// `ControlChar::from_char('c')` returns `Some(ControlChar::CtrlC)`.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        let c = c.to_ascii_lowercase();
        match c {
            'c' => Some(Self::CtrlC),
            'd' => Some(Self::CtrlD),
            'z' => Some(Self::CtrlZ),
            '\\' => Some(Self::CtrlBackslash),
            '[' => Some(Self::Escape),
            'a'..='y' | ']' | '^' | '_' => Some(Self::Other(c as u8 & 0x1F)),
            _ => None,
        }
    }
}

impl From<ControlChar> for u8 {
    fn from(c: ControlChar) -> Self {
        c.as_byte()
    }
}

/// A unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID.
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
