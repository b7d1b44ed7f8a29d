//! Random-access read/write traits, mirroring the teacher's `resource` module
//! (`ReadAt`/`WriteAt` on a single remote file handle) generalized here to
//! splice across a *list* of underlying files addressed by one global offset.

use crate::error::TarballError;

/// Random-access read over a byte stream of known, fixed length.
pub trait ReadAt {
    /// Reads up to `buf.len()` bytes starting at global `offset`, returning
    /// the number of bytes actually filled (short only at end of stream).
    ///
    /// # Panics
    ///
    /// Panics if `offset >= self.len()` — an out-of-range read is a
    /// programmer error, never something a remote peer can trigger, since
    /// offsets are validated against the tarball size before a read is ever
    /// issued.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, TarballError>;

    /// Total length of the underlying stream.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random-access write over a byte stream of known, fixed length.
pub trait WriteAt {
    /// Writes `data` starting at global `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + data.len() as u64 > self.len()`, for the same
    /// reason [`ReadAt::read_at`] panics out of range.
    fn write_at(&self, data: &[u8], offset: u64) -> Result<(), TarballError>;

    /// Total length of the underlying stream.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
