//! Configuration types for demo-expect.
//!
//! This module defines configuration structures for sessions, timeouts,
//! buffering, stream handling and transcript logging. Values can be built
//! programmatically, loaded from a file ([`file`]) or overridden from the
//! environment ([`env`]).

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::ShutdownConfig;

/// Default timeout for expect operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a child to exit during close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time spent collecting trailing output once the child has exited.
pub const DEFAULT_EXIT_DRAIN: Duration = Duration::from_millis(250);

/// Default buffer size (16 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The command to execute.
    pub command: String,

    /// Command arguments.
    pub args: Vec<String>,

    /// Environment variable overrides.
    pub env: HashMap<String, String>,

    /// Whether to inherit the parent environment.
    pub inherit_env: bool,

    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,

    /// Timeout configuration.
    pub timeout: TimeoutConfig,

    /// Buffer configuration.
    pub buffer: BufferConfig,

    /// How the child's standard error is handled.
    pub stderr: StderrMode,

    /// Line ending appended by `send_line`.
    pub line_ending: LineEnding,

    /// Transcript logging configuration.
    pub logging: LoggingConfig,

    /// How `close` shuts the child down.
    pub shutdown: ShutdownConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            inherit_env: true,
            working_dir: None,
            timeout: TimeoutConfig::default(),
            buffer: BufferConfig::default(),
            stderr: StderrMode::default(),
            line_ending: LineEnding::default(),
            logging: LoggingConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with the given command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the command arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set whether to inherit the parent environment.
    #[must_use]
    pub const fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Set the default expect timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout.default = timeout;
        self
    }

    /// Set the stderr handling mode.
    #[must_use]
    pub const fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Set the shutdown configuration.
    #[must_use]
    pub fn shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Apply overrides from `DEMO_EXPECT_*` environment variables.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        env::EnvConfig::default().apply(self)
    }

    /// Render the command and arguments for log messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Default timeout for expect operations.
    pub default: Duration,

    /// Time allowed for the child to exit at each step of `close`.
    pub close: Duration,

    /// How long trailing output is collected after the child exits.
    pub exit_drain: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
            exit_drain: DEFAULT_EXIT_DRAIN,
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration with the given default timeout.
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            ..Default::default()
        }
    }

    /// Set the close timeout.
    #[must_use]
    pub const fn close(mut self, timeout: Duration) -> Self {
        self.close = timeout;
        self
    }

    /// Set the exit drain window.
    #[must_use]
    pub const fn exit_drain(mut self, drain: Duration) -> Self {
        self.exit_drain = drain;
        self
    }
}

/// What happens when output exceeds the buffer's maximum size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail the pending expect with [`crate::ExpectError::BufferOverflow`].
    #[default]
    Error,

    /// Drop the oldest unconsumed bytes.
    DiscardOldest,
}

/// Configuration for the output buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Maximum buffer size in bytes.
    pub max_size: usize,

    /// Overflow behaviour.
    pub overflow: OverflowPolicy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BUFFER_SIZE,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl BufferConfig {
    /// Create a new buffer configuration with the given max size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }

    /// Set the overflow policy.
    #[must_use]
    pub const fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }
}

/// How the child's standard error stream is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrMode {
    /// Interleave stderr into the buffer that patterns are matched against.
    #[default]
    Merge,

    /// Capture stderr into its own buffer.
    Separate,

    /// Let the child write to the parent's stderr.
    Inherit,

    /// Discard stderr.
    Discard,
}

impl StderrMode {
    /// Whether the stream is piped back to the session.
    #[must_use]
    pub const fn is_captured(self) -> bool {
        matches!(self, Self::Merge | Self::Separate)
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Classic Mac line ending (CR).
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Detect the appropriate line ending for the current platform.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(windows) { Self::CrLf } else { Self::Lf }
    }
}

/// Configuration for the session transcript.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// File that receives everything read from and written to the child.
    pub log_file: Option<PathBuf>,

    /// Whether to echo child output to stdout.
    pub log_user: bool,
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log file path.
    #[must_use]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Set whether to echo to stdout.
    #[must_use]
    pub const fn log_user(mut self, enabled: bool) -> Self {
        self.log_user = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_builder() {
        let config = SessionConfig::new("./server")
            .args(["--Ice.PrintAdapterReady"])
            .env("LD_LIBRARY_PATH", "/opt/demo/lib")
            .working_dir("/opt/demo")
            .stderr(StderrMode::Separate)
            .timeout(Duration::from_secs(3));

        assert_eq!(config.command, "./server");
        assert_eq!(config.args, vec!["--Ice.PrintAdapterReady"]);
        assert_eq!(
            config.env.get("LD_LIBRARY_PATH").map(String::as_str),
            Some("/opt/demo/lib")
        );
        assert_eq!(config.working_dir, Some(PathBuf::from("/opt/demo")));
        assert_eq!(config.stderr, StderrMode::Separate);
        assert_eq!(config.timeout.default, Duration::from_secs(3));
        assert_eq!(config.command_line(), "./server --Ice.PrintAdapterReady");
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert!(config.inherit_env);
        assert!(config.env.is_empty());
        assert_eq!(config.timeout.default, DEFAULT_TIMEOUT);
        assert_eq!(config.buffer.overflow, OverflowPolicy::Error);
        assert_eq!(config.stderr, StderrMode::Merge);
        assert_eq!(config.line_ending, LineEnding::Lf);
    }

    #[test]
    fn line_ending_as_str() {
        assert_eq!(LineEnding::Lf.as_str(), "\n");
        assert_eq!(LineEnding::CrLf.as_str(), "\r\n");
        assert_eq!(LineEnding::Cr.as_str(), "\r");
    }

    #[test]
    fn stderr_capture() {
        assert!(StderrMode::Merge.is_captured());
        assert!(StderrMode::Separate.is_captured());
        assert!(!StderrMode::Inherit.is_captured());
        assert!(!StderrMode::Discard.is_captured());
    }
}
