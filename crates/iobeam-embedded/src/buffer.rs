//! Fixed-capacity scratch buffer
//!
//! One `ScratchBuf` is shared by every stage of a call: request lines are
//! formatted into it, socket reads land in it, and the response body is
//! handed back out of it. It never grows, always knows how many bytes it
//! holds, and zeroes whatever it gives up so stale bytes from an earlier use
//! cannot leak through a later one.

use core::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Default scratch capacity used by [`Session`](crate::Session)
pub const SCRATCH_LEN: usize = 256;

/// Bounded byte buffer with an explicit fill level
pub struct ScratchBuf<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> ScratchBuf<N> {
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Free space left after the valid bytes
    pub fn remaining(&self) -> usize {
        N - self.len
    }

    /// The valid bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Drop all content and zero the storage
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    /// Keep the first `len` bytes and zero the rest
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.data[len..self.len].fill(0);
            self.len = len;
        }
    }

    /// Append bytes, failing without writing anything if they do not fit
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        if bytes.len() > self.remaining() {
            return Err(ProtocolError::BufferTooSmall {
                needed: self.len + bytes.len(),
                have: N,
            });
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Writable tail for a socket read; pair with [`commit`](Self::commit)
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Mark `n` bytes of the spare tail as valid
    pub fn commit(&mut self, n: usize) {
        self.len = (self.len + n).min(N);
    }

    /// Move bytes `from..len` to the front, preserving order, and zero the
    /// vacated tail. This is the carry-over step that keeps a partial line or
    /// a partial body alive across socket reads.
    pub fn shift_to_front(&mut self, from: usize) {
        let from = from.min(self.len);
        if from == 0 {
            return;
        }
        self.data.copy_within(from..self.len, 0);
        let kept = self.len - from;
        self.data[kept..self.len].fill(0);
        self.len = kept;
    }

    /// Fill from a [`ByteSource`](crate::io::ByteSource), returning the number of new bytes
    pub fn fill_from<R: crate::io::ByteSource + ?Sized>(
        &mut self,
        source: &mut R,
    ) -> ProtocolResult<usize> {
        let n = source.read(self.spare_mut())?;
        self.commit(n);
        Ok(n)
    }
}

impl<const N: usize> Default for ScratchBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for ScratchBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchBuf")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish()
    }
}

/// Formatting appends; a piece that overflows reports `fmt::Error` and is dropped, so
/// callers that care measure first (see [`formatted_len`](crate::http::formatted_len)).
impl<const N: usize> fmt::Write for ScratchBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.extend_from_slice(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
