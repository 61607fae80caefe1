//! Error types for demo-expect.
//!
//! Every failure a session can report has its own variant so callers can
//! branch on it. Variants that relate to child output carry the unconsumed
//! buffer so a failing test shows what the child actually printed.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ProcessExitStatus, SessionState};

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let buffer_len = buffer.len();
    let lines: Vec<&str> = buffer.lines().collect();

    if buffer_len <= MAX_BUFFER_DISPLAY || lines.len() <= CONTEXT_LINES * 2 {
        return format!(
            "┌─ buffer ({} bytes, {} lines) ─────────────\n│ {}\n└────────────────────────────────────────",
            buffer_len,
            lines.len(),
            lines.join("\n│ ")
        );
    }

    let tail_lines = &lines[lines.len() - CONTEXT_LINES * 2..];
    let hidden = lines.len() - tail_lines.len();

    format!(
        "┌─ buffer ({} bytes, {} lines) ─────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer_len,
        lines.len(),
        hidden,
        tail_lines.join("\n│ ")
    )
}

fn format_timeout_error(duration: Duration, pattern: &str, buffer: &str) -> String {
    format!(
        "timeout after {duration:?} waiting for pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {}\n\
         \n\
         Tip: check that the text really appears in the output and that regex\n\
         metacharacters in the pattern are escaped.",
        format_buffer_snippet(buffer)
    )
}

fn format_end_of_output_error(
    pattern: &str,
    buffer: &str,
    exit_status: Option<&ProcessExitStatus>,
) -> String {
    let status = exit_status.map_or_else(|| "still running".to_string(), ToString::to_string);
    format!(
        "output ended before pattern matched (process {status})\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {}",
        format_buffer_snippet(buffer)
    )
}

fn format_exit_status_error(expected: &str, actual: &ProcessExitStatus, buffer: &str) -> String {
    format!(
        "unexpected exit status: expected {expected}, process {actual}\n\
         \n\
         {}",
        format_buffer_snippet(buffer)
    )
}

/// The main error type for demo-expect operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Failed to spawn a process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// The child's input stream is closed.
    #[error("broken pipe while {context}: the child's input is closed")]
    BrokenPipe {
        /// What was being written.
        context: String,
    },

    /// Timeout waiting for pattern match.
    #[error("{}", format_timeout_error(*duration, pattern, buffer))]
    Timeout {
        /// The timeout duration that elapsed.
        duration: Duration,
        /// The pattern that was being searched for.
        pattern: String,
        /// Buffer contents at the time of timeout.
        buffer: String,
    },

    /// The child closed its output before the pattern appeared.
    #[error("{}", format_end_of_output_error(pattern, buffer, exit_status.as_ref()))]
    EndOfOutput {
        /// The pattern that was being searched for.
        pattern: String,
        /// Buffer contents when output ended.
        buffer: String,
        /// Exit status, if the child had already been reaped.
        exit_status: Option<ProcessExitStatus>,
    },

    /// The child exited with a status the caller did not accept.
    #[error("{}", format_exit_status_error(expected, actual, buffer))]
    UnexpectedExitStatus {
        /// Description of the accepted status.
        expected: String,
        /// The status the child actually exited with.
        actual: ProcessExitStatus,
        /// Unconsumed output at exit.
        buffer: String,
    },

    /// A pattern that should not have appeared did.
    #[error("pattern '{pattern}' appeared but was expected to be absent (matched '{matched}')")]
    UnexpectedMatch {
        /// The pattern.
        pattern: String,
        /// The text it matched.
        matched: String,
    },

    /// Operation attempted in a state that does not allow it.
    #[error("cannot {operation}: session is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The session state at the time.
        state: SessionState,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Buffer overflow.
    #[error("buffer overflow: maximum size of {max_size} bytes exceeded")]
    BufferOverflow {
        /// The maximum buffer size that was exceeded.
        max_size: usize,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Signal delivery failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the signal error.
        message: String,
    },
}

/// Errors related to process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// Permission denied.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be executed.
        path: String,
    },

    /// Working directory error.
    #[error("invalid working directory: {path}")]
    InvalidWorkingDir {
        /// The invalid working directory path.
        path: String,
    },

    /// Invalid command or argument.
    #[error("invalid {kind}: {reason}")]
    InvalidArgument {
        /// The kind of invalid input (e.g., "command", "command line").
        kind: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for demo-expect operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error with the given details.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an end-of-output error.
    pub fn end_of_output(
        pattern: impl Into<String>,
        buffer: impl Into<String>,
        exit_status: Option<ProcessExitStatus>,
    ) -> Self {
        Self::EndOfOutput {
            pattern: pattern.into(),
            buffer: buffer.into(),
            exit_status,
        }
    }

    /// Create a broken pipe error.
    pub fn broken_pipe(context: impl Into<String>) -> Self {
        Self::BrokenPipe {
            context: context.into(),
        }
    }

    /// Create an invalid state error.
    #[must_use]
    pub const fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a buffer overflow error.
    #[must_use]
    pub const fn buffer_overflow(max_size: usize) -> Self {
        Self::BufferOverflow { max_size }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a signal error.
    pub fn signal(message: impl Into<String>) -> Self {
        Self::Signal {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Map a write failure, turning a closed pipe into [`ExpectError::BrokenPipe`].
    pub fn from_write(context: impl Into<String>, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                Self::broken_pipe(context)
            }
            _ => Self::io_context(context, source),
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an end-of-output error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::EndOfOutput { .. })
    }

    /// Check if this is a broken pipe error.
    #[must_use]
    pub const fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::BrokenPipe { .. })
    }

    /// Get the buffer contents if this error contains them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. }
            | Self::EndOfOutput { buffer, .. }
            | Self::UnexpectedExitStatus { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Create an invalid working directory error.
    pub fn invalid_working_dir(path: impl Into<String>) -> Self {
        Self::InvalidWorkingDir { path: path.into() }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Classify an error returned by the OS while starting `command`.
    #[must_use]
    pub fn from_spawn_io(command: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::command_not_found(command),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(command),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_has_pattern_and_buffer() {
        let err = ExpectError::timeout(
            Duration::from_secs(5),
            "Hello World!",
            "server ready\n",
        );
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("Hello World!"));
        assert!(msg.contains("server ready"));
        assert!(msg.contains("Tip:"));
    }

    #[test]
    fn end_of_output_display_mentions_status() {
        let err = ExpectError::end_of_output("ready", "bye\n", Some(ProcessExitStatus::Exited(3)));
        let msg = err.to_string();
        assert!(msg.contains("exited with code 3"));
        assert!(msg.contains("bye"));

        let err = ExpectError::end_of_output("ready", "", None);
        assert!(err.to_string().contains("still running"));
        assert!(err.to_string().contains("empty buffer"));
    }

    #[test]
    fn large_buffer_is_truncated() {
        let large_buffer: String = (0..50).fold(String::new(), |mut acc, i| {
            use std::fmt::Write;
            let _ = writeln!(acc, "Line {i}: some demo output here");
            acc
        });

        let msg = ExpectError::timeout(Duration::from_secs(1), "x", &large_buffer).to_string();
        assert!(msg.contains("lines hidden"));
        assert!(msg.contains("Line 49"));
        assert!(!msg.contains("Line 10:"));
    }

    #[test]
    fn classification_helpers() {
        let timeout = ExpectError::timeout(Duration::from_secs(1), "p", "b");
        assert!(timeout.is_timeout());
        assert!(!timeout.is_eof());
        assert_eq!(timeout.buffer(), Some("b"));

        let eof = ExpectError::end_of_output("p", "rest", None);
        assert!(eof.is_eof());
        assert_eq!(eof.buffer(), Some("rest"));

        let state = ExpectError::invalid_state("send", SessionState::Closed);
        assert!(state.buffer().is_none());
        assert_eq!(state.to_string(), "cannot send: session is closed");
    }

    #[test]
    fn write_errors_map_to_broken_pipe() {
        let err = ExpectError::from_write(
            "sending line",
            std::io::Error::from(std::io::ErrorKind::BrokenPipe),
        );
        assert!(err.is_broken_pipe());

        let err = ExpectError::from_write(
            "sending line",
            std::io::Error::from(std::io::ErrorKind::InvalidData),
        );
        assert!(matches!(err, ExpectError::IoWithContext { .. }));
    }

    #[test]
    fn spawn_io_classification() {
        let err = SpawnError::from_spawn_io(
            "./server",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, SpawnError::CommandNotFound { ref command } if command == "./server"));

        let err = SpawnError::from_spawn_io(
            "./server",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, SpawnError::PermissionDenied { .. }));
    }
}
