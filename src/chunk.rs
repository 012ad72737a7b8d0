//! Wire types for the chunked transport framing.
//!
//! Every chunk written to a non-negotiation channel starts with a
//! [`ChunkHeader`]: the message identifier grouping chunks of one packet, the
//! zero-based chunk index, and the size of the unfragmented packet. All three
//! fields are fixed-width little-endian `u32`s, so the header always occupies
//! [`HEADER_SIZE`] bytes.

use std::num::TryFromIntError;

use bincode::{
    Decode,
    Encode,
    config::{self, Configuration, Fixint, LittleEndian},
    error::DecodeError,
};
use derive_more::{Display, From, Into};

/// Encoded size of a [`ChunkHeader`].
pub const HEADER_SIZE: usize = 12;

/// Smallest transport frame a channel may accept without the chunk being
/// treated as rejected, unless the frame carried the whole remainder.
pub const MIN_FRAME_SIZE: usize = 64;

fn wire_config() -> Configuration<LittleEndian, Fixint> {
    config::standard().with_fixed_int_encoding()
}

/// Identifier shared by every chunk of one application packet.
///
/// # Examples
///
/// ```
/// use relaybridge::MessageId;
/// let id = MessageId::new(42);
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.next(), MessageId::new(43));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Display, From, Into)]
#[display("{_0}")]
pub struct MessageId(u32);

impl MessageId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the inner numeric identifier.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Return the identifier following this one, wrapping at `u32::MAX`.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

/// Zero-based position of a chunk within its message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Display, From,
)]
#[display("{_0}")]
pub struct ChunkIndex(u32);

impl ChunkIndex {
    /// Construct an index from a `u32` value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the first chunk index.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Increment the index, returning `None` on overflow.
    #[must_use]
    pub fn checked_increment(self) -> Option<Self> { self.0.checked_add(1).map(Self) }
}

impl TryFrom<usize> for ChunkIndex {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> { u32::try_from(value).map(Self) }
}

/// Prefix carried by each chunk of a framed message.
///
/// # Examples
///
/// ```
/// use relaybridge::{ChunkHeader, ChunkIndex, HEADER_SIZE, MessageId};
/// let header = ChunkHeader::new(MessageId::new(7), ChunkIndex::new(1), 300);
/// let bytes = header.encode();
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// let (decoded, body) = ChunkHeader::decode(&bytes).unwrap();
/// assert_eq!(decoded, header);
/// assert!(body.is_empty());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct ChunkHeader {
    message_id: MessageId,
    chunk_index: ChunkIndex,
    original_size: u32,
}

impl ChunkHeader {
    /// Create a new chunk header.
    #[must_use]
    pub const fn new(message_id: MessageId, chunk_index: ChunkIndex, original_size: u32) -> Self {
        Self {
            message_id,
            chunk_index,
            original_size,
        }
    }

    /// Return the message identifier.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Return the chunk position within the message.
    #[must_use]
    pub const fn chunk_index(&self) -> ChunkIndex { self.chunk_index }

    /// Return the size of the unfragmented packet.
    #[must_use]
    pub const fn original_size(&self) -> u32 { self.original_size }

    /// Encode the header into its fixed-size wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0_u8; HEADER_SIZE];
        // Three fixed-width u32 fields always fill the array exactly.
        let written = bincode::encode_into_slice(*self, &mut out, wire_config()).unwrap_or(0);
        debug_assert_eq!(written, HEADER_SIZE);
        out
    }

    /// Decode a header from the front of `chunk`, returning it with the
    /// payload bytes that follow.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when `chunk` is shorter than [`HEADER_SIZE`].
    pub fn decode(chunk: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let Some(head) = chunk.get(..HEADER_SIZE) else {
            return Err(DecodeError::UnexpectedEnd {
                additional: HEADER_SIZE - chunk.len(),
            });
        };
        let (header, _) = bincode::decode_from_slice::<Self, _>(head, wire_config())?;
        Ok((header, &chunk[HEADER_SIZE..]))
    }
}
