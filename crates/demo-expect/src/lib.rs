//! demo-expect: Expect-style sessions for driving demo programs
//!
//! This crate spawns a child process, writes lines to its standard input and
//! waits, with a timeout, for patterns to appear in its output. It is built
//! for scripting client/server demo programs and asserting on what they
//! print.
//!
//! # Features
//!
//! - **Async-first design** with the Tokio runtime, plus a blocking
//!   [`SyncSession`]
//! - **Regex patterns** (plain strings compile as regexes) and explicit
//!   literals, matched on raw bytes, with multi-pattern waits and
//!   end-of-output or timeout alternatives
//! - **Typed negative assertions** via [`Session::expect_absent`] and
//!   [`Session::expect_outcome`]
//! - **Deterministic cleanup**: sessions are shut down and reaped on
//!   [`Session::close`] or drop
//! - **Demo harness** helpers in [`demo`]
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use demo_expect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut client = Session::spawn("./client", &[]).await?;
//!     client.send_line("i").await?;
//!     client.expect("Hello World!").await?;
//!
//!     client.send_line("?").await?;
//!     client.expect_absent("Hello World!", Duration::from_secs(1)).await?;
//!
//!     client.send_line("x").await?;
//!     client.wait_success().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod types;

pub mod backend;
pub mod demo;
pub mod expect;
pub mod session;
pub mod sync;
pub mod util;

pub use config::{
    BufferConfig, LineEnding, LoggingConfig, OverflowPolicy, SessionConfig, StderrMode,
    TimeoutConfig,
};
pub use error::{ExpectError, Result, SpawnError};
pub use expect::{
    CompiledRegex, IntoPattern, Matcher, NamedPattern, OutputBuffer, Pattern, PatternSet,
};
pub use session::{
    ExitExpectation, Session, SessionBuilder, ShutdownConfig, ShutdownStrategy, Signal,
    TerminateHandle, split_command_line,
};
pub use sync::{SyncSession, block_on};
pub use types::{
    ControlChar, ExpectResult, Match, ProcessExitStatus, SessionId, SessionState,
};
pub use util::{Deadline, TimeoutExt};
