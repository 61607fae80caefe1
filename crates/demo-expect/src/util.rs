//! Utility modules shared by the session and expect machinery.

pub mod timeout;

pub use timeout::{Deadline, TimeoutExt};
