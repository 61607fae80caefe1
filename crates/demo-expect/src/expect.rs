//! Expect pattern matching module.
//!
//! Pattern types, the output buffer and the matching engine used by
//! [`crate::Session`].

mod buffer;
mod matcher;
mod pattern;

pub use buffer::OutputBuffer;
pub use matcher::{ExpectState, MatchResult, Matcher};
pub use pattern::{
    CompiledRegex, IntoPattern, NamedPattern, Pattern, PatternMatch, PatternSet,
};
