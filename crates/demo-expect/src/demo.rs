//! Helpers for scripting demo client/server programs.
//!
//! A demo script locates its distribution once with [`find_root`], picks an
//! [`ExecutableNaming`] for the language the demo is built in, and spawns
//! each program through a [`DemoLauncher`]. Every value is passed explicitly,
//! so scripts running in parallel cannot disturb each other.
//!
//! ```no_run
//! use demo_expect::demo::{DemoLauncher, ExecutableNaming};
//! use demo_expect::Signal;
//!
//! # async fn demo() -> demo_expect::Result<()> {
//! let launcher = DemoLauncher::new(".").naming(ExecutableNaming::interpreted("mono", ".exe"));
//!
//! let mut server = launcher.spawn("server --Ice.PrintAdapterReady").await?;
//! server.expect_regex(".* ready").await?;
//!
//! let mut client = launcher.spawn("client").await?;
//! client.wait_success().await?;
//! server.expect("Hello World!").await?;
//!
//! server.terminate(Signal::Interrupt)?;
//! server.wait_success().await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use crate::config::SessionConfig;
use crate::error::{ExpectError, Result, SpawnError};
use crate::session::{Session, split_command_line};
use crate::sync::SyncSession;

/// Find the nearest ancestor of `start` (inclusive) that contains `marker`.
///
/// # Errors
///
/// Returns [`ExpectError::Config`] if no ancestor contains the marker.
pub fn find_root(start: impl AsRef<Path>, marker: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start.as_ref();
    let marker = marker.as_ref();
    let found = start
        .ancestors()
        .find(|dir| dir.join(marker).exists())
        .map(Path::to_path_buf);

    match found {
        Some(root) => {
            tracing::debug!(root = %root.display(), marker = %marker.display(), "found demo root");
            Ok(root)
        }
        None => Err(ExpectError::config(format!(
            "no directory containing {} above {}",
            marker.display(),
            start.display()
        ))),
    }
}

/// How a demo program name maps to something the OS can execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutableNaming {
    /// Run the program as named.
    #[default]
    Native,
    /// Append a file extension, such as `.exe`.
    Suffix(String),
    /// Append `suffix` and run the result through `interpreter`
    /// (for example `mono client.exe`).
    Interpreted {
        /// Interpreter program.
        interpreter: String,
        /// Extension appended to the program name.
        suffix: String,
    },
}

impl ExecutableNaming {
    /// Shorthand for [`ExecutableNaming::Suffix`].
    #[must_use]
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self::Suffix(suffix.into())
    }

    /// Shorthand for [`ExecutableNaming::Interpreted`].
    #[must_use]
    pub fn interpreted(interpreter: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::Interpreted {
            interpreter: interpreter.into(),
            suffix: suffix.into(),
        }
    }

    /// The program file name with any extension applied.
    #[must_use]
    pub fn file_name(&self, program: &str) -> String {
        match self {
            Self::Native => program.to_string(),
            Self::Suffix(suffix) | Self::Interpreted { suffix, .. } => {
                if suffix.is_empty() || program.ends_with(suffix.as_str()) {
                    program.to_string()
                } else {
                    format!("{program}{suffix}")
                }
            }
        }
    }

    /// The interpreter, if programs are not executed directly.
    #[must_use]
    pub fn interpreter(&self) -> Option<&str> {
        match self {
            Self::Interpreted { interpreter, .. } => Some(interpreter),
            Self::Native | Self::Suffix(_) => None,
        }
    }
}

/// Spawns demo programs from one directory with a shared configuration.
#[derive(Debug, Clone)]
pub struct DemoLauncher {
    root: PathBuf,
    naming: ExecutableNaming,
    base: SessionConfig,
}

impl DemoLauncher {
    /// Create a launcher for programs in `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            naming: ExecutableNaming::default(),
            base: SessionConfig::default(),
        }
    }

    /// Set how program names are turned into executables.
    #[must_use]
    pub fn naming(mut self, naming: ExecutableNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Set the configuration every spawned session starts from.
    ///
    /// The command, arguments and working directory are replaced per spawn.
    #[must_use]
    pub fn base_config(mut self, config: SessionConfig) -> Self {
        self.base = config;
        self
    }

    /// The directory programs run in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The executable naming in use.
    #[must_use]
    pub const fn executable_naming(&self) -> &ExecutableNaming {
        &self.naming
    }

    /// Path of `program` after naming is applied.
    ///
    /// Bare names and relative paths are resolved against the launcher
    /// directory; absolute paths are kept.
    #[must_use]
    pub fn resolve(&self, program: &str) -> PathBuf {
        let file = PathBuf::from(self.naming.file_name(program));
        if file.is_absolute() {
            file
        } else {
            self.root.join(file)
        }
    }

    /// The session configuration for a command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the command line is empty or malformed.
    pub fn config_for(&self, command_line: &str) -> Result<SessionConfig> {
        let mut words = split_command_line(command_line)?;
        let program = words.remove(0);
        let path = self.resolve(&program);
        let path = path.to_str().ok_or_else(|| {
            SpawnError::invalid_argument("program", format!("{} is not valid UTF-8", path.display()))
        })?;

        let (command, args) = match self.naming.interpreter() {
            Some(interpreter) => {
                let mut args = Vec::with_capacity(words.len() + 1);
                args.push(path.to_string());
                args.extend(words);
                (interpreter.to_string(), args)
            }
            None => (path.to_string(), words),
        };

        let mut config = self.base.clone();
        config.command = command;
        config.args = args;
        config.working_dir = Some(self.root.clone());
        Ok(config)
    }

    /// Spawn a demo program.
    ///
    /// # Errors
    ///
    /// Returns an error if the command line is invalid or spawning fails.
    pub async fn spawn(&self, command_line: &str) -> Result<Session> {
        let config = self.config_for(command_line)?;
        tracing::debug!(command = %config.command_line(), "launching demo program");
        Session::spawn_with_config(config).await
    }

    /// Spawn a demo program behind the blocking API.
    ///
    /// # Errors
    ///
    /// Returns an error if the command line is invalid or spawning fails.
    pub fn spawn_sync(&self, command_line: &str) -> Result<SyncSession> {
        let config = self.config_for(command_line)?;
        tracing::debug!(command = %config.command_line(), "launching demo program");
        SyncSession::spawn_with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("demo-expect-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn find_root_walks_up() {
        let root = scratch_dir("root");
        std::fs::create_dir_all(root.join("demoscript")).unwrap();
        let nested = root.join("vb/demo/Ice/minimal");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_root(&nested, "demoscript").unwrap(), root);
        assert_eq!(find_root(&root, "demoscript").unwrap(), root);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn find_root_reports_missing_marker() {
        let dir = scratch_dir("no-marker");
        let err = find_root(&dir, "definitely-not-a-marker-file").unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn naming_applies_suffix_once() {
        let exe = ExecutableNaming::suffix(".exe");
        assert_eq!(exe.file_name("client"), "client.exe");
        assert_eq!(exe.file_name("client.exe"), "client.exe");
        assert_eq!(ExecutableNaming::Native.file_name("client"), "client");
        assert_eq!(exe.interpreter(), None);
    }

    #[test]
    fn launcher_resolves_against_root() {
        let launcher = DemoLauncher::new("/opt/demo").naming(ExecutableNaming::suffix(".exe"));
        assert_eq!(launcher.resolve("server"), PathBuf::from("/opt/demo/server.exe"));
        assert_eq!(launcher.resolve("/usr/bin/env"), PathBuf::from("/usr/bin/env.exe"));
    }

    #[test]
    fn interpreted_config() {
        let launcher = DemoLauncher::new("/opt/demo")
            .naming(ExecutableNaming::interpreted("mono", ".exe"))
            .base_config(SessionConfig::default().timeout(Duration::from_secs(30)));
        let config = launcher
            .config_for("server.exe --Ice.PrintAdapterReady")
            .unwrap();

        assert_eq!(config.command, "mono");
        assert_eq!(config.args, vec!["/opt/demo/server.exe", "--Ice.PrintAdapterReady"]);
        assert_eq!(config.working_dir.as_deref(), Some(Path::new("/opt/demo")));
        assert_eq!(config.timeout.default, Duration::from_secs(30));
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let launcher = DemoLauncher::new(".");
        assert!(launcher.config_for("   ").is_err());
    }
}
