//! Quality-of-Service contract and the default chunk reassembler.
//!
//! The bridge pushes every inbound chunk into a [`QualityOfService`]
//! implementation and forwards whatever complete packet it hands back. The
//! same collaborator issues identifiers for outbound messages and declares
//! the framing constants the outbound path relies on.
//!
//! [`ChunkReassembler`] buffers fragments per message, accepts them in any
//! order, guards against unbounded allocation with a configurable cap, and
//! purges stale partial messages after a fixed timeout.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    num::NonZeroUsize,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use bincode::error::DecodeError;
use thiserror::Error;

use crate::chunk::{ChunkHeader, ChunkIndex, MIN_FRAME_SIZE, MessageId};

/// Errors produced while reassembling inbound chunks.
#[derive(Debug, Error)]
pub enum ReassemblyError {
    /// The chunk was too short to contain a header.
    #[error("chunk header could not be decoded: {0}")]
    TruncatedHeader(#[from] DecodeError),
    /// The announced packet size exceeds the configured cap.
    #[error("message {message_id} announces {announced} bytes, limit is {limit}")]
    MessageTooLarge {
        message_id: MessageId,
        announced: usize,
        limit: NonZeroUsize,
    },
    /// The buffered fragments exceed the announced packet size.
    #[error("message {message_id} buffered {buffered} bytes but announced {announced}")]
    SizeOverflow {
        message_id: MessageId,
        buffered: usize,
        announced: usize,
    },
    /// A later chunk announced a different packet size than the first one.
    #[error("message {message_id} changed its announced size from {expected} to {found}")]
    SizeMismatch {
        message_id: MessageId,
        expected: usize,
        found: usize,
    },
}

/// Collaborator that reassembles inbound chunks and numbers outbound messages.
pub trait QualityOfService: Send {
    /// Feed one inbound chunk (header plus payload).
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError`] if the chunk is malformed or violates the
    /// size limits of the implementation.
    fn push_received_chunk(&mut self, chunk: &[u8]) -> Result<(), ReassemblyError>;

    /// Take the next fully reassembled packet, if any.
    fn next_packet(&mut self) -> Option<Vec<u8>>;

    /// Issue a fresh identifier for an outbound message.
    fn outgoing_packet_id(&self) -> MessageId;

    /// Smallest transport frame counted as a successful chunk write.
    ///
    /// Every chunk carries a [`HEADER_SIZE`](crate::HEADER_SIZE)-byte
    /// [`ChunkHeader`](crate::ChunkHeader); the header is not negotiable.
    fn min_frame_size(&self) -> usize { MIN_FRAME_SIZE }
}

#[derive(Debug)]
struct PartialMessage {
    announced: usize,
    fragments: BTreeMap<ChunkIndex, Vec<u8>>,
    buffered: usize,
    started_at: Instant,
}

impl PartialMessage {
    fn new(announced: usize, started_at: Instant) -> Self {
        Self {
            announced,
            fragments: BTreeMap::new(),
            buffered: 0,
            started_at,
        }
    }

    /// Store a fragment, replacing any earlier fragment with the same index.
    fn insert(&mut self, index: ChunkIndex, payload: &[u8]) {
        if let Some(previous) = self.fragments.insert(index, payload.to_vec()) {
            self.buffered -= previous.len();
        }
        self.buffered += payload.len();
    }

    fn is_complete(&self) -> bool { self.buffered == self.announced }

    fn into_packet(self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.announced);
        for fragment in self.fragments.into_values() {
            packet.extend_from_slice(&fragment);
        }
        packet
    }
}

/// Default [`QualityOfService`] implementation with timeout-based eviction.
#[derive(Debug)]
pub struct ChunkReassembler {
    max_message_size: NonZeroUsize,
    timeout: Duration,
    min_frame_size: usize,
    buffers: HashMap<MessageId, PartialMessage>,
    ready: VecDeque<Vec<u8>>,
    next_outgoing: AtomicU32,
}

impl ChunkReassembler {
    /// Create a reassembler enforcing `max_message_size` and evicting partial
    /// messages older than `timeout`.
    #[must_use]
    pub fn new(max_message_size: NonZeroUsize, timeout: Duration) -> Self {
        Self {
            max_message_size,
            timeout,
            min_frame_size: MIN_FRAME_SIZE,
            buffers: HashMap::new(),
            ready: VecDeque::new(),
            next_outgoing: AtomicU32::new(0),
        }
    }

    /// Override the minimum frame size reported to the outbound path.
    #[must_use]
    pub fn with_min_frame_size(mut self, min_frame_size: usize) -> Self {
        self.min_frame_size = min_frame_size;
        self
    }

    /// Process a chunk using an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError`] when the chunk cannot be decoded or breaks
    /// the size invariants of its message; the partial message is dropped in
    /// the latter case.
    pub fn push_at(&mut self, chunk: &[u8], now: Instant) -> Result<(), ReassemblyError> {
        self.purge_expired_at(now);

        let (header, payload) = ChunkHeader::decode(chunk)?;
        let message_id = header.message_id();
        let announced = header.original_size() as usize;
        if announced > self.max_message_size.get() {
            self.buffers.remove(&message_id);
            return Err(ReassemblyError::MessageTooLarge {
                message_id,
                announced,
                limit: self.max_message_size,
            });
        }

        let partial = self
            .buffers
            .entry(message_id)
            .or_insert_with(|| PartialMessage::new(announced, now));
        if partial.announced != announced {
            let expected = partial.announced;
            self.buffers.remove(&message_id);
            return Err(ReassemblyError::SizeMismatch {
                message_id,
                expected,
                found: announced,
            });
        }

        partial.insert(header.chunk_index(), payload);
        if partial.buffered > partial.announced {
            let buffered = partial.buffered;
            self.buffers.remove(&message_id);
            return Err(ReassemblyError::SizeOverflow {
                message_id,
                buffered,
                announced,
            });
        }

        if partial.is_complete() {
            if let Some(done) = self.buffers.remove(&message_id) {
                self.ready.push_back(done.into_packet());
            }
        }
        Ok(())
    }

    /// Remove partial messages that exceeded the configured timeout.
    ///
    /// Returns the identifiers of messages that were evicted.
    pub fn purge_expired(&mut self) -> Vec<MessageId> { self.purge_expired_at(Instant::now()) }

    /// Remove partial messages that exceeded the configured timeout using an
    /// explicit clock reading.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<MessageId> {
        let mut evicted = Vec::new();
        let timeout = self.timeout;

        self.buffers.retain(|message_id, partial| {
            let expired = now.saturating_duration_since(partial.started_at) >= timeout;
            if expired {
                evicted.push(*message_id);
            }
            !expired
        });

        evicted
    }

    /// Number of partial messages currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buffers.len() }
}

impl QualityOfService for ChunkReassembler {
    fn push_received_chunk(&mut self, chunk: &[u8]) -> Result<(), ReassemblyError> {
        self.push_at(chunk, Instant::now())
    }

    fn next_packet(&mut self) -> Option<Vec<u8>> { self.ready.pop_front() }

    fn outgoing_packet_id(&self) -> MessageId {
        MessageId::new(self.next_outgoing.fetch_add(1, Ordering::Relaxed))
    }

    fn min_frame_size(&self) -> usize { self.min_frame_size }
}
