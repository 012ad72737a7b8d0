//! Canonical error and result types for the crate.
//!
//! [`BridgeError`] separates protocol violations, which stop the offending
//! operation and must reach the caller, from faults raised by devices or the
//! relay that a caller may choose to tolerate.

use thiserror::Error;

use crate::{
    chunk::{ChunkIndex, MessageId},
    codec::CodecError,
    device::DeviceError,
    qos::ReassemblyError,
    relay::RelayError,
};

/// Top-level error type exposed by `relaybridge`.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The negotiation argument buffer could not be decoded.
    #[error("malformed negotiation arguments: {0}")]
    InvalidNegotiationArgs(#[source] CodecError),
    /// A negotiation channel accepted only part of an unframed packet.
    #[error("negotiation channel does not support chunking: packet size {packet_size}, channel sent {accepted}")]
    FramingViolation { packet_size: usize, accepted: usize },
    /// A device claimed to accept more bytes than it was offered.
    #[error("device reported {accepted} bytes accepted out of {offered} offered")]
    DeviceOverreport { offered: usize, accepted: usize },
    /// A chunk kept being rejected until the retry policy gave up.
    #[error("chunk {chunk_index} of message {message_id} rejected {attempts} times")]
    ChunkRejected {
        message_id: MessageId,
        chunk_index: ChunkIndex,
        attempts: u32,
    },
    /// The packet cannot be described by the 32-bit size field of the chunk header.
    #[error("packet of {size} bytes is too large to frame")]
    PacketTooLarge { size: usize },
    /// A device primitive failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// An inbound chunk could not be reassembled.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
    /// The relay refused a packet or command.
    #[error(transparent)]
    Relay(#[from] RelayError),
    /// The relay owning this bridge no longer exists.
    #[error("owning relay has been dropped")]
    RelayUnavailable,
    /// A device used its handle after the bridge was released.
    #[error("bridge {0} has been released")]
    BridgeReleased(crate::identity::DeviceId),
    /// The update thread could not be started.
    #[error("failed to spawn update thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The update thread panicked outside its contained region.
    #[error("update thread panicked")]
    TaskPanicked,
}

impl BridgeError {
    /// Whether the error is a protocol violation rather than a recoverable fault.
    ///
    /// Fatal errors leave the peer unable to reassemble the affected message;
    /// recoverable ones describe a transient refusal by a collaborator.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidNegotiationArgs(_)
                | Self::FramingViolation { .. }
                | Self::DeviceOverreport { .. }
                | Self::ChunkRejected { .. }
                | Self::PacketTooLarge { .. }
        )
    }
}

/// Canonical result alias used by `relaybridge` public APIs.
pub type Result<T> = std::result::Result<T, BridgeError>;
