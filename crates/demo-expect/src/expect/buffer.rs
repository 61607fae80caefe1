//! Accumulating output buffer.
//!
//! Holds the bytes a child has written since the last successful match.
//! A match consumes everything up to and including the matched text; the
//! remainder stays for the next expect call.

use std::collections::VecDeque;
use std::fmt;

use crate::config::{BufferConfig, OverflowPolicy};
use crate::error::{ExpectError, Result};

/// Initial allocation cap, independent of the configured maximum.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Buffer of unconsumed child output.
#[derive(Clone)]
pub struct OutputBuffer {
    data: VecDeque<u8>,
    max_size: usize,
    overflow: OverflowPolicy,
    total_written: usize,
    bytes_discarded: usize,
    /// Output was rejected under [`OverflowPolicy::Error`]; the stream has a
    /// gap until [`clear`](Self::clear).
    overflowed: bool,
}

impl OutputBuffer {
    /// Create a buffer from configuration.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            data: VecDeque::with_capacity(config.max_size.min(INITIAL_CAPACITY)),
            max_size: config.max_size,
            overflow: config.overflow,
            total_written: 0,
            bytes_discarded: 0,
            overflowed: false,
        }
    }

    /// Create a buffer with the given maximum size and the default overflow policy.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self::new(BufferConfig::new(max_size))
    }

    /// Append data to the buffer.
    ///
    /// Under [`OverflowPolicy::Error`] data that does not fit is rejected,
    /// the buffer is left unchanged and every later append is rejected too
    /// until [`clear`](Self::clear), so unconsumed output never has a hole in
    /// it. Under [`OverflowPolicy::DiscardOldest`] the oldest bytes make room.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.overflowed {
            return Err(ExpectError::buffer_overflow(self.max_size));
        }
        let overflow = (self.data.len() + data.len()).saturating_sub(self.max_size);
        if overflow > 0 {
            match self.overflow {
                OverflowPolicy::Error => {
                    self.overflowed = true;
                    return Err(ExpectError::buffer_overflow(self.max_size));
                }
                OverflowPolicy::DiscardOldest => {
                    self.total_written += data.len();
                    if data.len() >= self.max_size {
                        self.bytes_discarded += self.data.len() + data.len() - self.max_size;
                        self.data.clear();
                        self.data.extend(&data[data.len() - self.max_size..]);
                        return Ok(());
                    }
                    self.bytes_discarded += overflow;
                    self.data.drain(..overflow);
                    self.data.extend(data);
                    return Ok(());
                }
            }
        }

        self.total_written += data.len();
        self.data.extend(data);
        Ok(())
    }

    /// Get the current contents as a contiguous slice.
    #[must_use]
    pub fn as_slice(&mut self) -> &[u8] {
        self.data.make_contiguous()
    }

    /// Get the current contents as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        let (front, back) = self.data.as_slices();
        if back.is_empty() {
            return String::from_utf8_lossy(front).into_owned();
        }
        let mut bytes = Vec::with_capacity(self.data.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Current number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes held at once.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Total bytes ever appended.
    #[must_use]
    pub const fn total_written(&self) -> usize {
        self.total_written
    }

    /// Bytes dropped by [`OverflowPolicy::DiscardOldest`].
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// Whether output has been rejected since the last [`clear`](Self::clear).
    #[must_use]
    pub const fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Discard all contents and accept output again after an overflow.
    pub fn clear(&mut self) {
        self.data.clear();
        self.overflowed = false;
    }

    /// Remove and return the first `end` bytes.
    pub fn consume(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.data.len());
        self.data.drain(..end).collect()
    }

    /// Remove the first `pos` bytes and return them as a string.
    pub fn consume_before(&mut self, pos: usize) -> String {
        String::from_utf8_lossy(&self.consume(pos)).into_owned()
    }

    /// Position of the first occurrence of `needle`.
    #[must_use]
    pub fn find(&mut self, needle: &[u8]) -> Option<usize> {
        find_bytes(self.as_slice(), needle)
    }
}

/// Naive substring search over bytes.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("overflow", &self.overflow)
            .field("total_written", &self.total_written)
            .field("bytes_discarded", &self.bytes_discarded)
            .field("overflowed", &self.overflowed)
            .finish()
    }
}
