//! Pattern matching engine for expect operations.
//!
//! [`Matcher`] couples the output buffer with pattern search and match
//! consumption. [`ExpectState`] tracks the deadline and end-of-output for a
//! single expect call.

use std::time::Duration;

use super::buffer::OutputBuffer;
use super::pattern::{Pattern, PatternSet};
use crate::config::BufferConfig;
use crate::error::Result;
use crate::types::Match;
use crate::util::Deadline;

/// The pattern matching engine.
#[derive(Debug, Default)]
pub struct Matcher {
    buffer: OutputBuffer,
}

impl Matcher {
    /// Create a new matcher with the given buffer configuration.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            buffer: OutputBuffer::new(config),
        }
    }

    /// Append data to the buffer.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.append(data)
    }

    /// Get the current buffer.
    #[must_use]
    pub const fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    /// Get the current buffer contents as a string.
    #[must_use]
    pub fn buffer_str(&self) -> String {
        self.buffer.to_string_lossy()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to match a single pattern against the buffer.
    #[must_use]
    pub fn try_match(&mut self, pattern: &Pattern) -> Option<MatchResult> {
        pattern.matches(self.buffer.as_slice()).map(|m| MatchResult {
            pattern_index: 0,
            start: m.start,
            end: m.end,
            captures: m.captures,
        })
    }

    /// Try to match any pattern from a set against the buffer.
    ///
    /// The match that starts earliest wins; ties go to the lower index.
    #[must_use]
    pub fn try_match_any(&mut self, patterns: &PatternSet) -> Option<MatchResult> {
        patterns
            .find_match(self.buffer.as_slice())
            .map(|(pattern_index, m)| MatchResult {
                pattern_index,
                start: m.start,
                end: m.end,
                captures: m.captures,
            })
    }

    /// Consume matched content from the buffer and return a [`Match`].
    ///
    /// Everything before the match is returned in `before`; the match itself
    /// is removed; the rest stays buffered and is reported in `after`.
    pub fn consume_match(&mut self, result: &MatchResult) -> Match {
        let before = self.buffer.consume_before(result.start);
        let matched_bytes = self.buffer.consume(result.len());
        let matched = String::from_utf8_lossy(&matched_bytes).into_owned();
        let after = self.buffer_str();

        Match::new(result.pattern_index, matched, before, after)
            .with_captures(result.captures.clone())
    }

    /// Consume the whole buffer as the `before` of an end-of-output match.
    pub fn consume_all(&mut self, pattern_index: usize) -> Match {
        let len = self.buffer.len();
        let before = self.buffer.consume_before(len);
        Match::new(pattern_index, String::new(), before, String::new())
    }
}

/// Result of a pattern match, before consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    pub pattern_index: usize,
    /// Start position in the buffer.
    pub start: usize,
    /// End position in the buffer.
    pub end: usize,
    /// Capture groups.
    pub captures: Vec<String>,
}

impl MatchResult {
    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Per-call state of an expect operation.
#[derive(Debug)]
pub struct ExpectState<'a> {
    patterns: &'a PatternSet,
    deadline: Deadline,
    timeout: Duration,
    timeout_index: Option<usize>,
}

impl<'a> ExpectState<'a> {
    /// Start an expect operation.
    ///
    /// A [`Pattern::Timeout`] in the set shorter than `timeout` replaces it,
    /// and its expiry counts as a match of that pattern.
    #[must_use]
    pub fn new(patterns: &'a PatternSet, timeout: Duration) -> Self {
        let (timeout, timeout_index) = match patterns.timeout_pattern() {
            Some((index, d)) if d <= timeout => (d, Some(index)),
            _ => (timeout, None),
        };
        Self {
            patterns,
            deadline: Deadline::from_now(timeout),
            timeout,
            timeout_index,
        }
    }

    /// The patterns being matched.
    #[must_use]
    pub const fn patterns(&self) -> &PatternSet {
        self.patterns
    }

    /// The deadline for this operation.
    #[must_use]
    pub const fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// The effective timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the operation has timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.deadline.is_expired()
    }

    /// Get the remaining time until timeout.
    #[must_use]
    pub fn remaining_time(&self) -> Duration {
        self.deadline.remaining()
    }

    /// Index of the timeout pattern that fires at the deadline, if any.
    #[must_use]
    pub const fn timeout_index(&self) -> Option<usize> {
        self.timeout_index
    }

    /// Index of the EOF pattern, if the set accepts end of output.
    #[must_use]
    pub fn eof_index(&self) -> Option<usize> {
        self.patterns.eof_index()
    }

    /// Description of the patterns for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        self.patterns.describe()
    }
}
