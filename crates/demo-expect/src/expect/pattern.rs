//! Pattern types for expect operations.
//!
//! Patterns are matched against raw output bytes. Literal text and regular
//! expressions find a position in the buffer; [`Pattern::Eof`] and
//! [`Pattern::Timeout`] are satisfied by events rather than by text.

use std::fmt;
use std::time::Duration;

use regex::bytes::Regex;

use super::buffer::find_bytes;
use crate::error::Result;

/// A pattern that can be matched against child output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),

    /// Match end of output.
    Eof,

    /// Match when the given time elapses without any other pattern matching.
    Timeout(Duration),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self::Regex(CompiledRegex::new(pattern)?))
    }

    /// Create an EOF pattern.
    #[must_use]
    pub const fn eof() -> Self {
        Self::Eof
    }

    /// Create a timeout pattern.
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
            Self::Eof => "<EOF>",
            Self::Timeout(_) => "<TIMEOUT>",
        }
    }

    /// Find the leftmost match of this pattern in `text`.
    #[must_use]
    pub fn matches(&self, text: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => find_bytes(text, s.as_bytes()).map(|pos| PatternMatch {
                start: pos,
                end: pos + s.len(),
                captures: Vec::new(),
            }),
            Self::Regex(r) => r.find(text),
            Self::Eof | Self::Timeout(_) => None,
        }
    }

    /// Check if this is a timeout pattern.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is an EOF pattern.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Get the timeout duration if this is a timeout pattern.
    #[must_use]
    pub const fn timeout_duration(&self) -> Option<Duration> {
        match self {
            Self::Timeout(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
            Self::Eof => write!(f, "Eof"),
            Self::Timeout(d) => write!(f, "Timeout({d:?})"),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CompiledRegex> for Pattern {
    fn from(r: CompiledRegex) -> Self {
        Self::Regex(r)
    }
}

/// Conversion accepted by the expect family of calls.
///
/// Strings are compiled as regular expressions, so `".* ready"` matches any
/// line ending in `ready`. Wrap text in [`Pattern::literal`] to match it
/// exactly.
pub trait IntoPattern {
    /// Convert into a [`Pattern`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::ExpectError::Regex`] if a string is not a valid regular
    /// expression.
    fn into_pattern(self) -> Result<Pattern>;
}

impl IntoPattern for Pattern {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(self)
    }
}

impl IntoPattern for CompiledRegex {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(Pattern::Regex(self))
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(Pattern::regex(self)?)
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<Pattern> {
        self.as_str().into_pattern()
    }
}

impl IntoPattern for &String {
    fn into_pattern(self) -> Result<Pattern> {
        self.as_str().into_pattern()
    }
}

/// A compiled byte-oriented regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Compile a regular expression.
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the leftmost match, collecting capture groups if the expression has any.
    #[must_use]
    pub fn find(&self, text: &[u8]) -> Option<PatternMatch> {
        if self.regex.captures_len() <= 1 {
            return self.regex.find(text).map(|m| PatternMatch {
                start: m.start(),
                end: m.end(),
                captures: Vec::new(),
            });
        }

        let caps = self.regex.captures(text)?;
        let whole = caps.get(0)?;
        let captures = caps
            .iter()
            .skip(1)
            .map(|m| m.map_or_else(String::new, |m| String::from_utf8_lossy(m.as_bytes()).into_owned()))
            .collect();
        Some(PatternMatch {
            start: whole.start(),
            end: whole.end(),
            captures,
        })
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledRegex").field(&self.pattern).finish()
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match in the text.
    pub start: usize,
    /// End position of the match in the text.
    pub end: usize,
    /// Capture groups (for regex patterns).
    pub captures: Vec<String>,
}

impl PatternMatch {
    /// Get the matched bytes from the original input.
    #[must_use]
    pub fn as_bytes<'a>(&self, text: &'a [u8]) -> &'a [u8] {
        &text[self.start..self.end]
    }

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

/// A pattern with an optional name.
#[derive(Debug, Clone)]
pub struct NamedPattern {
    /// The pattern.
    pub pattern: Pattern,
    /// Optional name for the pattern.
    pub name: Option<String>,
    /// Index in the pattern set.
    pub index: usize,
}

/// A set of alternative patterns for a single expect call.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<NamedPattern>,
}

impl PatternSet {
    /// Create a new empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pattern set from a vector of patterns.
    #[must_use]
    pub fn from_patterns(patterns: Vec<Pattern>) -> Self {
        patterns.into_iter().collect()
    }

    /// Add a pattern to the set.
    pub fn add(&mut self, pattern: Pattern) -> &mut Self {
        let index = self.patterns.len();
        self.patterns.push(NamedPattern {
            pattern,
            name: None,
            index,
        });
        self
    }

    /// Add a named pattern to the set.
    pub fn add_named(&mut self, name: impl Into<String>, pattern: Pattern) -> &mut Self {
        let index = self.patterns.len();
        self.patterns.push(NamedPattern {
            pattern,
            name: Some(name.into()),
            index,
        });
        self
    }

    /// Get the number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Find the pattern whose match starts earliest in `text`.
    ///
    /// When two patterns match at the same position the lower index wins.
    #[must_use]
    pub fn find_match(&self, text: &[u8]) -> Option<(usize, PatternMatch)> {
        let mut best: Option<(usize, PatternMatch)> = None;

        for named in &self.patterns {
            if let Some(m) = named.pattern.matches(text) {
                match &best {
                    Some((_, current)) if m.start >= current.start => {}
                    _ => best = Some((named.index, m)),
                }
            }
        }

        best
    }

    /// Get a pattern by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&NamedPattern> {
        self.patterns.get(index)
    }

    /// Index of the first timeout pattern with the shortest duration.
    #[must_use]
    pub fn timeout_pattern(&self) -> Option<(usize, Duration)> {
        self.patterns
            .iter()
            .filter_map(|p| p.pattern.timeout_duration().map(|d| (p.index, d)))
            .min_by_key(|&(index, d)| (d, index))
    }

    /// Get the minimum timeout from timeout patterns.
    #[must_use]
    pub fn min_timeout(&self) -> Option<Duration> {
        self.timeout_pattern().map(|(_, d)| d)
    }

    /// Index of the first EOF pattern.
    #[must_use]
    pub fn eof_index(&self) -> Option<usize> {
        self.patterns.iter().find(|p| p.pattern.is_eof()).map(|p| p.index)
    }

    /// Check if any pattern is an EOF pattern.
    #[must_use]
    pub fn has_eof(&self) -> bool {
        self.eof_index().is_some()
    }

    /// Get iterator over patterns.
    pub fn iter(&self) -> impl Iterator<Item = &NamedPattern> {
        self.patterns.iter()
    }

    /// Human-readable description of every alternative, for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| match &p.name {
                Some(name) => format!("{name}={}", p.pattern),
                None => p.pattern.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl From<Pattern> for PatternSet {
    fn from(pattern: Pattern) -> Self {
        std::iter::once(pattern).collect()
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<T: IntoIterator<Item = Pattern>>(iter: T) -> Self {
        let mut set = Self::new();
        for pattern in iter {
            set.add(pattern);
        }
        set
    }
}
