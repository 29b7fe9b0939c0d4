//! Transfer buffer attached to file and custom devices.
//!
//! The buffer holds either read-ahead bytes or pending output, never both.
//! The device core decides which by its direction state.

/// Default buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A fixed-capacity byte buffer with a consume cursor.
///
/// Invariants: `pos <= filled <= data.len()`.
#[derive(Debug)]
pub struct StreamBuffer {
    data: Vec<u8>,
    /// Next unread byte (read side).
    pos: usize,
    /// Number of valid bytes.
    filled: usize,
}

impl StreamBuffer {
    /// Creates an empty buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            pos: 0,
            filled: 0,
        }
    }

    /// Returns the buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of buffered bytes not yet consumed (read side).
    #[must_use]
    pub fn available(&self) -> usize {
        self.filled - self.pos
    }

    /// Number of pending output bytes (write side).
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filled == self.pos
    }

    /// Copies buffered read-ahead into `out`, returning the count.
    pub fn consume(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Returns the whole storage for a refill. Call [`Self::filled`] after.
    pub fn refill_slot(&mut self) -> &mut [u8] {
        self.pos = 0;
        self.filled = 0;
        &mut self.data
    }

    /// Records how many bytes a refill produced.
    pub fn filled(&mut self, n: usize) {
        debug_assert!(n <= self.data.len());
        self.pos = 0;
        self.filled = n.min(self.data.len());
    }

    /// Appends pending output, returning how many bytes fit.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.data.len() - self.filled);
        self.data[self.filled..self.filled + n].copy_from_slice(&bytes[..n]);
        self.filled += n;
        n
    }

    /// Returns true if no more output fits.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.filled == self.data.len()
    }

    /// Drops the first `n` pending output bytes after a partial flush.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.filled);
        self.data.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    /// Discards everything.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }
}
