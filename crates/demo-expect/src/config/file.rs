//! File-based configuration loading.
//!
//! A demo suite can keep its timeouts, environment and stream settings in a
//! TOML or JSON file next to the demos instead of hard-coding them:
//!
//! ```toml
//! timeout_secs = 5.0
//! stderr = "separate"
//!
//! [env]
//! LD_LIBRARY_PATH = "/opt/demo/lib"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LineEnding, SessionConfig, StderrMode};
use crate::error::{ExpectError, Result};

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Session settings as they appear in a configuration file.
///
/// Every field is optional; unset fields leave the corresponding
/// [`SessionConfig`] value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Default expect timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Close timeout in seconds.
    pub close_timeout_secs: Option<f64>,
    /// Exit drain window in milliseconds.
    pub exit_drain_ms: Option<u64>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Whether to inherit the parent environment.
    pub inherit_env: Option<bool>,
    /// Working directory for spawned programs.
    pub working_dir: Option<PathBuf>,
    /// Stderr handling.
    pub stderr: Option<StderrMode>,
    /// Line ending used by `send_line`.
    pub line_ending: Option<LineEnding>,
    /// Maximum buffer size in bytes.
    pub buffer_max_size: Option<usize>,
    /// Transcript file.
    pub log_file: Option<PathBuf>,
    /// Echo child output to stdout.
    pub log_user: Option<bool>,
}

impl ConfigFile {
    /// Load a configuration file, choosing the parser from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            ExpectError::config(format!(
                "unknown config format for {} (expected .toml or .json)",
                path.display()
            ))
        })?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExpectError::io_context(format!("reading {}", path.display()), e))?;

        tracing::debug!(path = %path.display(), ?format, "loading config file");
        Self::parse(&content, format)
    }

    /// Parse configuration text in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let file: Self = match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ExpectError::config(e.to_string()))?
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ExpectError::config(e.to_string()))?
            }
        };
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("timeout_secs", self.timeout_secs),
            ("close_timeout_secs", self.close_timeout_secs),
        ] {
            match secs {
                Some(secs) if !(secs.is_finite() && secs >= 0.0) => {
                    return Err(ExpectError::config(format!(
                        "{name} must be a non-negative number, got {secs}"
                    )));
                }
                _ => {}
            }
        }
        if self.buffer_max_size == Some(0) {
            return Err(ExpectError::config("buffer_max_size must be greater than zero"));
        }
        Ok(())
    }

    /// Apply the settings present in this file to `config`.
    #[must_use]
    pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(secs) = self.timeout_secs {
            config.timeout.default = secs_to_duration(secs);
        }
        if let Some(secs) = self.close_timeout_secs {
            config.timeout.close = secs_to_duration(secs);
        }
        if let Some(ms) = self.exit_drain_ms {
            config.timeout.exit_drain = Duration::from_millis(ms);
        }
        config
            .env
            .extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(inherit) = self.inherit_env {
            config.inherit_env = inherit;
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = Some(dir.clone());
        }
        if let Some(mode) = self.stderr {
            config.stderr = mode;
        }
        if let Some(ending) = self.line_ending {
            config.line_ending = ending;
        }
        if let Some(size) = self.buffer_max_size {
            config.buffer.max_size = size;
        }
        if let Some(path) = &self.log_file {
            config.logging.log_file = Some(path.clone());
        }
        if let Some(echo) = self.log_user {
            config.logging.log_user = echo;
        }
        config
    }
}

/// Seconds that do not fit a `Duration` saturate.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Locates configuration files across a list of directories.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a search path.
    #[must_use]
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Find `name`, trying the exact name and then `.toml` and `.json`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.search_paths.iter().find_map(|dir| {
            std::iter::once(dir.join(name))
                .chain(["toml", "json"].iter().map(|ext| dir.join(format!("{name}.{ext}"))))
                .find(|p| p.is_file())
        })
    }

    /// Find and load `name`, returning `None` when no file exists.
    pub fn load(&self, name: &str) -> Result<Option<ConfigFile>> {
        self.find(name).map(ConfigFile::load).transpose()
    }
}
