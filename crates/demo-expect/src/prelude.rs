//! Convenient re-exports for common demo-expect usage.
//!
//! ```no_run
//! use demo_expect::prelude::*;
//!
//! # async fn demo() -> Result<()> {
//! let mut session = Session::spawn("./server", &[]).await?;
//! session.expect_regex(".* ready").await?;
//! session.terminate(Signal::Interrupt)?;
//! session.wait_success().await?;
//! # Ok(())
//! # }
//! ```

// Core types
pub use crate::config::{
    BufferConfig, LineEnding, LoggingConfig, SessionConfig, StderrMode, TimeoutConfig,
};

// Error handling
pub use crate::error::{ExpectError, Result, SpawnError};

// Common types
pub use crate::types::{ControlChar, ExpectResult, Match, ProcessExitStatus, SessionState};

// Session types
pub use crate::session::{
    ExitExpectation, Session, SessionBuilder, ShutdownConfig, ShutdownStrategy, Signal,
    TerminateHandle,
};

// Pattern types
pub use crate::expect::{IntoPattern, Pattern, PatternSet};

// Demo harness
pub use crate::demo::{DemoLauncher, ExecutableNaming, find_root};

// Sync wrapper
pub use crate::sync::{SyncSession, block_on};
