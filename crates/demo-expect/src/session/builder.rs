//! Session builder for constructing sessions with custom configuration.
//!
//! This module provides a builder pattern for creating sessions with
//! customized configuration options, and the command-line splitter used by
//! [`Session::spawn_command_line`].

use std::path::PathBuf;
use std::time::Duration;

use super::handle::Session;
use super::lifecycle::ShutdownConfig;
use crate::config::{
    BufferConfig, LineEnding, LoggingConfig, SessionConfig, StderrMode, TimeoutConfig,
};
use crate::error::{Result, SpawnError};

/// Builder for creating sessions.
///
/// ```no_run
/// use std::time::Duration;
/// use demo_expect::SessionBuilder;
///
/// # async fn demo() -> demo_expect::Result<()> {
/// let mut server = SessionBuilder::new()
///     .command("./server")
///     .env("ICE_CONFIG", "config.server")
///     .timeout(Duration::from_secs(30))
///     .spawn()
///     .await?;
/// server.expect(".* ready").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Start from an existing configuration.
    #[must_use]
    pub const fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set the command to execute.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.config.command = command.into();
        self
    }

    /// Set the command arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Set the command and arguments from a command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is empty or has an unterminated quote.
    pub fn command_line(mut self, line: &str) -> Result<Self> {
        let mut words = split_command_line(line)?;
        self.config.command = words.remove(0);
        self.config.args = words;
        Ok(self)
    }

    /// Set environment variables.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.env = envs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set a single environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Start the child with only the variables set on this builder.
    #[must_use]
    pub const fn clear_env(mut self) -> Self {
        self.config.inherit_env = false;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_dir = Some(path.into());
        self
    }

    /// Set the default timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout.default = timeout;
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub const fn timeout_config(mut self, config: TimeoutConfig) -> Self {
        self.config.timeout = config;
        self
    }

    /// Set the buffer max size.
    #[must_use]
    pub const fn buffer_max_size(mut self, max_size: usize) -> Self {
        self.config.buffer.max_size = max_size;
        self
    }

    /// Set the buffer configuration.
    #[must_use]
    pub const fn buffer_config(mut self, config: BufferConfig) -> Self {
        self.config.buffer = config;
        self
    }

    /// Set how the child's stderr is handled.
    #[must_use]
    pub const fn stderr(mut self, mode: StderrMode) -> Self {
        self.config.stderr = mode;
        self
    }

    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.config.line_ending = line_ending;
        self
    }

    /// Use Windows line endings (CRLF).
    #[must_use]
    pub const fn windows_line_endings(self) -> Self {
        self.line_ending(LineEnding::CrLf)
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Enable logging to a file.
    #[must_use]
    pub fn log_to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logging.log_file = Some(path.into());
        self
    }

    /// Set the shutdown behaviour used by `close`.
    #[must_use]
    pub fn shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.config.shutdown = shutdown;
        self
    }

    /// Apply `DEMO_EXPECT_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.config = self.config.with_env_overrides();
        self
    }

    /// Build the session configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }

    /// Spawn a session with this configuration.
    ///
    /// # Errors
    ///
    /// See [`Session::spawn_with_config`].
    pub async fn spawn(self) -> Result<Session> {
        Session::spawn_with_config(self.config).await
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SessionBuilder> for SessionConfig {
    fn from(builder: SessionBuilder) -> Self {
        builder.build()
    }
}

/// Split a command line into words.
///
/// Words are separated by whitespace. Single quotes preserve their content
/// literally; inside double quotes a backslash escapes `"` and `\`; outside
/// quotes a backslash escapes any character. Adjacent quoted and unquoted
/// pieces join into one word, so `--name="a b"` is a single argument.
///
/// # Errors
///
/// Returns [`SpawnError::InvalidArgument`] for an empty line, an unterminated
/// quote or a trailing backslash.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::None, '\\') => {
                let escaped = chars.next().ok_or_else(|| {
                    SpawnError::invalid_argument("command line", "trailing backslash")
                })?;
                current.push(escaped);
                in_word = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => {
                    return Err(SpawnError::invalid_argument(
                        "command line",
                        "unterminated double quote",
                    )
                    .into());
                }
            },
            (_, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    match quote {
        Quote::Single => {
            return Err(
                SpawnError::invalid_argument("command line", "unterminated single quote").into(),
            );
        }
        Quote::Double => {
            return Err(
                SpawnError::invalid_argument("command line", "unterminated double quote").into(),
            );
        }
        Quote::None => {}
    }
    if in_word {
        words.push(current);
    }
    if words.is_empty() {
        return Err(SpawnError::invalid_argument("command line", "command line is empty").into());
    }
    Ok(words)
}
