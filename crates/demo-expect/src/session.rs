//! Session module for managing spawned process interactions.
//!
//! This module provides the core session types: the session handle, its
//! builder, and lifecycle management (signals, shutdown and exit waits).
//!
//! # Overview
//!
//! The [`Session`] type is the main entry point. It provides methods for:
//!
//! - Spawning processes with [`Session::spawn`] and [`SessionBuilder`]
//! - Sending input with [`Session::send`], [`Session::send_line`]
//! - Expecting output with [`Session::expect`], [`Session::expect_any`]
//! - Waiting for exit with [`Session::wait_for_exit`]
//! - Shutting down with [`Session::terminate`] and [`Session::close`]
//!
//! # Examples
//!
//! ## Negative assertions
//!
//! ```no_run
//! use std::time::Duration;
//! use demo_expect::Session;
//!
//! # async fn demo() -> demo_expect::Result<()> {
//! let mut client = Session::spawn("./client", &[]).await?;
//! client.send_line("?").await?;
//! client.expect_absent("Hello World!", Duration::from_secs(1)).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Multi-Pattern Matching
//!
//! ```no_run
//! use std::time::Duration;
//! use demo_expect::{Pattern, PatternSet, Session};
//!
//! # async fn demo() -> demo_expect::Result<()> {
//! let mut server = Session::spawn("./server", &[]).await?;
//!
//! let mut patterns = PatternSet::new();
//! patterns
//!     .add(Pattern::regex(r".* ready")?)
//!     .add(Pattern::literal("error"))
//!     .add(Pattern::timeout(Duration::from_secs(5)));
//!
//! let result = server.expect_any(&patterns).await?;
//! assert_eq!(result.pattern_index, 0, "server did not start: {}", result.before);
//! # Ok(())
//! # }
//! ```

mod builder;
mod handle;
mod lifecycle;

pub use builder::{SessionBuilder, split_command_line};
pub use handle::Session;
pub use lifecycle::{
    ExitExpectation, ShutdownConfig, ShutdownStrategy, Signal, TerminateHandle,
};
