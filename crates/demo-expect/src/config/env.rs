//! Environment-based configuration.
//!
//! Reads `DEMO_EXPECT_*` variables so a CI job can stretch timeouts or turn
//! on transcripts without touching the test code.

use std::collections::HashMap;
use std::time::Duration;

use super::SessionConfig;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "DEMO_EXPECT";

/// Recognized variable names (without prefix).
pub mod vars {
    /// Default expect timeout in seconds (fractions allowed).
    pub const TIMEOUT: &str = "TIMEOUT";
    /// Transcript file path.
    pub const LOG_FILE: &str = "LOG_FILE";
    /// Echo child output to stdout.
    pub const LOG_USER: &str = "LOG_USER";
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Injected variables; `None` reads the process environment.
    source: Option<HashMap<String, String>>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: None,
        }
    }

    /// Create a reader over an explicit set of variables.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            source: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        match &self.source {
            Some(vars) => vars.get(&var_name).cloned(),
            None => std::env::var(&var_name).ok(),
        }
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration given in (possibly fractional) seconds.
    #[must_use]
    pub fn duration_secs(&self, name: &str) -> Option<Duration> {
        let raw = self.get(name)?;
        match raw.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
            Ok(Ok(duration)) => Some(duration),
            _ => {
                tracing::warn!(variable = %self.var_name(name), value = %raw, "ignoring invalid duration");
                None
            }
        }
    }

    /// Apply every recognized override to `config`.
    #[must_use]
    pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(timeout) = self.duration_secs(vars::TIMEOUT) {
            config.timeout.default = timeout;
        }
        if let Some(path) = self.get(vars::LOG_FILE) {
            config.logging.log_file = Some(path.into());
        }
        if let Some(echo) = self.bool(vars::LOG_USER) {
            config.logging.log_user = echo;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_names_use_prefix() {
        let config = EnvConfig::new("TEST");
        assert_eq!(config.var_name("timeout"), "TEST_TIMEOUT");
        assert_eq!(EnvConfig::new("").var_name("log_file"), "LOG_FILE");
    }

    #[test]
    fn apply_overrides() {
        let env = EnvConfig::from_vars(
            DEFAULT_PREFIX,
            [
                ("DEMO_EXPECT_TIMEOUT", "2.5"),
                ("DEMO_EXPECT_LOG_FILE", "/tmp/demo.log"),
                ("DEMO_EXPECT_LOG_USER", "yes"),
            ],
        );
        let config = env.apply(SessionConfig::default());

        assert_eq!(config.timeout.default, Duration::from_millis(2500));
        assert_eq!(config.logging.log_file, Some("/tmp/demo.log".into()));
        assert!(config.logging.log_user);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let env = EnvConfig::from_vars(DEFAULT_PREFIX, [("DEMO_EXPECT_TIMEOUT", "soon")]);
        let config = env.apply(SessionConfig::default());
        assert_eq!(config.timeout.default, super::super::DEFAULT_TIMEOUT);

        let env = EnvConfig::from_vars(DEFAULT_PREFIX, [("DEMO_EXPECT_TIMEOUT", "-1")]);
        assert!(env.duration_secs(vars::TIMEOUT).is_none());
    }

    #[test]
    fn bool_parsing() {
        let env = EnvConfig::from_vars("T", [("T_A", "On"), ("T_B", "0")]);
        assert_eq!(env.bool("a"), Some(true));
        assert_eq!(env.bool("b"), Some(false));
        assert_eq!(env.bool("c"), None);
    }
}
