//! Fixed-width binary reading and writing over contiguous buffers.
//!
//! [`ByteView`] is a non-owning cursor that consumes its prefix as values are
//! read; [`ByteWriter`] appends values to a growable buffer. Integers are
//! little-endian and byte sequences carry a `u32` length prefix, which is the
//! layout used for negotiation arguments.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Size of the length prefix preceding variable-length byte sequences.
pub const LENGTH_PREFIX_SIZE: usize = std::mem::size_of::<u32>();

/// Errors raised when a buffer cannot hold the requested value.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes remained than the value requires.
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    Underrun { needed: usize, remaining: usize },
    /// A byte sequence is too long for its `u32` length prefix.
    #[error("byte sequence of {len} bytes exceeds the u32 length prefix")]
    SequenceTooLong { len: usize },
}

fn length_prefix(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::SequenceTooLong { len })
}

/// Non-owning view over a byte buffer supporting prefix consumption.
///
/// # Examples
///
/// ```
/// use relaybridge::ByteView;
/// let mut view = ByteView::new(&[2, 0, 0, 0, 0x41, 0x42, 7]);
/// assert_eq!(view.read_bytes().unwrap(), &[0x41, 0x42]);
/// assert_eq!(view.read_u8().unwrap(), 7);
/// assert!(view.is_empty());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteView<'a> {
    remaining: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Create a view covering all of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self { Self { remaining: bytes } }

    /// Number of unread bytes.
    #[must_use]
    pub const fn len(&self) -> usize { self.remaining.len() }

    /// Whether every byte has been consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.remaining.is_empty() }

    /// Borrow the unread bytes without consuming them.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [u8] { self.remaining }

    /// Drop `count` bytes from the front of the view.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] if fewer than `count` bytes remain; the
    /// view is left untouched in that case.
    pub fn remove_prefix(&mut self, count: usize) -> Result<(), CodecError> {
        self.take(count).map(|_| ())
    }

    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] when the view is empty.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.remaining.get_u8())
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] when fewer than four bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.remaining.get_u32_le())
    }

    /// Read a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] when fewer than eight bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.remaining.get_u64_le())
    }

    /// Read a `u32` length prefix followed by that many bytes.
    ///
    /// On failure the view is left where it was before the call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] when the prefix or the announced body
    /// is incomplete.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let mut probe = *self;
        let len = probe.read_u32()? as usize;
        let body = probe.take(len)?;
        *self = probe;
        Ok(body)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(count)?;
        let (head, tail) = self.remaining.split_at(count);
        self.remaining = tail;
        Ok(head)
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.remaining.len() < needed {
            return Err(CodecError::Underrun {
                needed,
                remaining: self.remaining.len(),
            });
        }
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(bytes: &'a [u8]) -> Self { Self::new(bytes) }
}

/// Growable buffer writer producing the layout read by [`ByteView`].
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a single byte.
    #[must_use]
    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Append a little-endian `u32`.
    #[must_use]
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Append a little-endian `u64`.
    #[must_use]
    pub fn u64(mut self, value: u64) -> Self {
        self.buf.put_u64_le(value);
        self
    }

    /// Append a `u32` length prefix followed by `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SequenceTooLong`] if `bytes` is longer than
    /// `u32::MAX`; nothing is written in that case.
    pub fn bytes(mut self, bytes: &[u8]) -> Result<Self, CodecError> {
        let len = length_prefix(bytes.len())?;
        self.buf.put_u32_le(len);
        self.buf.put_slice(bytes);
        Ok(self)
    }

    /// Append `bytes` verbatim, without a length prefix.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Finish writing and return the buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> { self.buf.to_vec() }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ByteView, ByteWriter, CodecError, length_prefix};

    #[test]
    fn reads_fixed_width_integers_little_endian() {
        let bytes = ByteWriter::new().u8(9).u32(0x0102_0304).u64(7).into_vec();
        assert_eq!(&bytes[1..5], &[0x04, 0x03, 0x02, 0x01]);

        let mut view = ByteView::new(&bytes);
        assert_eq!(view.read_u8(), Ok(9));
        assert_eq!(view.read_u32(), Ok(0x0102_0304));
        assert_eq!(view.read_u64(), Ok(7));
        assert!(view.is_empty());
    }

    #[test]
    fn length_prefixed_sequences_leave_remainder() -> Result<(), CodecError> {
        let bytes = ByteWriter::new()
            .bytes(b"AB")?
            .bytes(b"")?
            .raw(b"tail")
            .into_vec();
        let mut view = ByteView::new(&bytes);
        assert_eq!(view.read_bytes(), Ok(&b"AB"[..]));
        assert_eq!(view.read_bytes(), Ok(&b""[..]));
        assert_eq!(view.as_slice(), b"tail");
        Ok(())
    }

    #[test]
    fn oversized_sequences_are_refused() {
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX));
        assert_eq!(
            length_prefix(usize::MAX),
            Err(CodecError::SequenceTooLong { len: usize::MAX })
        );
    }

    #[rstest]
    #[case::missing_prefix(&[1, 0][..], 4, 2)]
    #[case::short_body(&[3, 0, 0, 0, 0xAA][..], 3, 1)]
    fn truncated_sequences_fail_without_consuming(
        #[case] bytes: &[u8],
        #[case] needed: usize,
        #[case] remaining: usize,
    ) {
        let mut view = ByteView::new(bytes);
        assert_eq!(
            view.read_bytes(),
            Err(CodecError::Underrun { needed, remaining })
        );
        assert_eq!(view.len(), bytes.len());
    }

    #[test]
    fn remove_prefix_respects_bounds() {
        let mut view = ByteView::new(&[1, 2, 3]);
        assert!(view.remove_prefix(2).is_ok());
        assert_eq!(view.as_slice(), &[3]);
        assert!(view.remove_prefix(2).is_err());
        assert_eq!(view.as_slice(), &[3]);
    }
}
