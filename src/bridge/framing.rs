//! Outbound chunking and inbound reassembly.

use std::{
    sync::{Arc, PoisonError},
    thread,
};

use log::{debug, warn};

use super::DeviceBridge;
use crate::{
    chunk::{ChunkHeader, ChunkIndex, HEADER_SIZE, MessageId},
    device::{Device, WritePermit},
    error::{BridgeError, Result},
    metrics::{self, Direction},
};

/// Framing parameters captured from the reassembler for one message.
#[derive(Clone, Copy, Debug)]
struct FrameLimits {
    min_frame_size: usize,
}

impl FrameLimits {
    /// Whether a transport acceptance of `accepted` bytes out of `offered`
    /// completes the chunk.
    fn accepts(self, accepted: usize, offered: usize) -> bool {
        accepted > HEADER_SIZE && (accepted >= self.min_frame_size || accepted == offered)
    }
}

impl DeviceBridge {
    /// Write an application packet to the device.
    ///
    /// Ordinary bridges split the packet into chunks, each prefixed with a
    /// [`ChunkHeader`], and keep offering a chunk until the transport accepts
    /// enough of it. Negotiation bridges hand the whole packet over in a
    /// single write. The write guard is held for the entire message, so
    /// chunks of concurrent sends never interleave.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::FramingViolation`] when a negotiation channel accepts
    ///   a different number of bytes than offered.
    /// - [`BridgeError::DeviceOverreport`] when the device claims more bytes
    ///   than it was given.
    /// - [`BridgeError::ChunkRejected`] when a limited retry policy runs out.
    /// - [`BridgeError::PacketTooLarge`] when the packet size does not fit
    ///   the header.
    /// - [`BridgeError::Device`] when the send primitive fails.
    pub fn send_framed(&self, packet: &[u8]) -> Result<()> {
        if self.role.is_negotiation() {
            return self
                .device
                .exclusive(|device, permit| send_unframed(device, permit, packet));
        }

        let original_size =
            u32::try_from(packet.len()).map_err(|_| BridgeError::PacketTooLarge { size: packet.len() })?;
        let (message_id, limits) = {
            let qos = self.qos.lock().unwrap_or_else(PoisonError::into_inner);
            let limits = FrameLimits {
                min_frame_size: qos.min_frame_size(),
            };
            (qos.outgoing_packet_id(), limits)
        };

        self.device.exclusive(|device, permit| {
            self.send_chunks(device, permit, packet, message_id, original_size, limits)
        })?;
        metrics::inc_packets(Direction::Outbound);
        Ok(())
    }

    fn send_chunks(
        &self,
        device: &dyn Device,
        permit: &WritePermit<'_>,
        packet: &[u8],
        message_id: MessageId,
        original_size: u32,
        limits: FrameLimits,
    ) -> Result<()> {
        let mut remaining = packet;
        let mut chunk_index = ChunkIndex::zero();
        let mut rejections = 0_u32;
        let mut frame = Vec::with_capacity(HEADER_SIZE + packet.len());

        while !remaining.is_empty() {
            frame.clear();
            frame.extend_from_slice(&ChunkHeader::new(message_id, chunk_index, original_size).encode());
            frame.extend_from_slice(remaining);

            let accepted = device.on_send_to_channel(permit, &frame)?;
            if accepted > frame.len() {
                return Err(BridgeError::DeviceOverreport {
                    offered: frame.len(),
                    accepted,
                });
            }

            if limits.accepts(accepted, frame.len()) {
                let consumed = accepted - HEADER_SIZE;
                debug!(
                    "chunk accepted: did={}, message_id={message_id}, chunk_index={chunk_index}, consumed={consumed}",
                    self.did
                );
                metrics::inc_chunks_sent();
                remaining = &remaining[consumed..];
                rejections = 0;
                if remaining.is_empty() {
                    break;
                }
                chunk_index = chunk_index
                    .checked_increment()
                    .ok_or(BridgeError::PacketTooLarge { size: packet.len() })?;
                continue;
            }

            rejections = rejections.saturating_add(1);
            metrics::inc_chunk_rejections();
            if !self.retry.allows_retry(rejections) {
                warn!(
                    "giving up on chunk: did={}, message_id={message_id}, chunk_index={chunk_index}, rejections={rejections}",
                    self.did
                );
                return Err(BridgeError::ChunkRejected {
                    message_id,
                    chunk_index,
                    attempts: rejections,
                });
            }
            warn!(
                "chunk rejected, retrying: did={}, message_id={message_id}, chunk_index={chunk_index}, accepted={accepted}, offered={}",
                self.did,
                frame.len()
            );
            let backoff = self.retry.backoff();
            if !backoff.is_zero() {
                thread::sleep(backoff);
            }
        }
        Ok(())
    }

    /// Hand bytes received from the medium to the inbound path.
    ///
    /// The initiating side of a negotiation forwards `packet` to the relay
    /// verbatim. Every other bridge feeds it to the reassembler and forwards
    /// each packet that becomes complete; partial messages are buffered
    /// silently.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Reassembly`] when the chunk is malformed.
    /// - [`BridgeError::Relay`] when the relay refuses a packet.
    /// - [`BridgeError::RelayUnavailable`] when the relay is gone.
    pub fn pass_network_packet(self: &Arc<Self>, packet: &[u8]) -> Result<()> {
        if self.role.forwards_unframed() {
            return self.forward_to_relay(packet);
        }

        let ready = {
            let mut qos = self.qos.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(error) = qos.push_received_chunk(packet) {
                warn!("dropping inbound chunk: did={}, error={error}", self.did);
                return Err(error.into());
            }
            std::iter::from_fn(|| qos.next_packet()).collect::<Vec<_>>()
        };

        ready
            .iter()
            .try_for_each(|complete| self.forward_to_relay(complete))
    }

    fn forward_to_relay(self: &Arc<Self>, packet: &[u8]) -> Result<()> {
        self.relay()?.on_packet_received(packet, self)?;
        metrics::inc_packets(Direction::Inbound);
        Ok(())
    }
}

fn send_unframed(device: &dyn Device, permit: &WritePermit<'_>, packet: &[u8]) -> Result<()> {
    let accepted = device.on_send_to_channel(permit, packet)?;
    if accepted != packet.len() {
        tracing::error!(packet_size = packet.len(), accepted, "negotiation channel split a packet");
        return Err(BridgeError::FramingViolation {
            packet_size: packet.len(),
            accepted,
        });
    }
    metrics::inc_packets(Direction::Outbound);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::FrameLimits;

    #[rstest]
    #[case::full_frame(20, 20, true)]
    #[case::above_minimum(16, 40, true)]
    #[case::below_minimum(15, 40, false)]
    #[case::header_only(12, 12, false)]
    #[case::nothing(0, 40, false)]
    fn acceptance_rule(#[case] accepted: usize, #[case] offered: usize, #[case] ok: bool) {
        let limits = FrameLimits { min_frame_size: 16 };
        assert_eq!(limits.accepts(accepted, offered), ok);
    }
}
