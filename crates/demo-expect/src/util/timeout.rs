//! Timeout utilities.
//!
//! Every blocking operation in the crate is a single loop bounded by one
//! [`Deadline`]; nothing is retried once it expires.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, Sleep, Timeout, timeout};

/// Extension trait for adding timeouts to futures.
pub trait TimeoutExt: Sized {
    /// Wrap this future with a timeout.
    fn with_timeout(self, duration: Duration) -> Timeout<Self>;

    /// Wrap this future with a timeout in milliseconds.
    fn with_timeout_ms(self, ms: u64) -> Timeout<Self> {
        self.with_timeout(Duration::from_millis(ms))
    }
}

impl<F: Future> TimeoutExt for F {
    fn with_timeout(self, duration: Duration) -> Timeout<Self> {
        timeout(duration, self)
    }
}

/// A deadline tracker for operations with multiple steps.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    deadline: Instant,
}

impl Deadline {
    /// Create a new deadline from now.
    #[must_use]
    pub fn from_now(duration: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started.checked_add(duration).unwrap_or_else(far_future),
        }
    }

    /// The total time budget this deadline was created with.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.deadline.saturating_duration_since(self.started)
    }

    /// The instant at which the deadline expires.
    #[must_use]
    pub const fn instant(&self) -> Instant {
        self.deadline
    }

    /// Time elapsed since the deadline was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get the remaining time until the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// A sleep future that completes at the deadline.
    #[must_use]
    pub fn sleep(&self) -> Sleep {
        tokio::time::sleep_until(self.deadline)
    }
}

/// Roughly thirty years out; used when a caller asks for an unbounded wait.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}
