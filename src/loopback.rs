//! In-memory channel pair with a hard frame-size limit.
//!
//! Each [`LoopbackChannel`] writes into its peer's inbox and reads its own
//! inbox when polled. Writes longer than the frame limit are truncated and
//! only the accepted prefix is delivered, mimicking a medium with a fixed
//! maximum transmission unit.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    time::Duration,
};

use crate::{
    bridge::BridgeHandle,
    device::{Device, DeviceError, UpdateCadence, UpdateDelay, WritePermit},
};

type Inbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// One end of an in-memory channel.
#[derive(Debug)]
pub struct LoopbackChannel {
    inbox: Inbox,
    outbox: Inbox,
    frame_limit: usize,
    bridge: OnceLock<BridgeHandle>,
    cadence: UpdateCadence,
}

impl LoopbackChannel {
    /// Create two connected ends, each accepting at most `frame_limit` bytes
    /// per write.
    #[must_use]
    pub fn pair(frame_limit: usize) -> (Self, Self) {
        let left: Inbox = Arc::default();
        let right: Inbox = Arc::default();
        (
            Self::new(Arc::clone(&left), Arc::clone(&right), frame_limit),
            Self::new(right, left, frame_limit),
        )
    }

    fn new(inbox: Inbox, outbox: Inbox, frame_limit: usize) -> Self {
        Self {
            inbox,
            outbox,
            frame_limit,
            bridge: OnceLock::new(),
            cadence: UpdateCadence::new(UpdateDelay::Fixed(Duration::from_millis(5))),
        }
    }

    /// Maximum number of bytes accepted per write.
    #[must_use]
    pub fn frame_limit(&self) -> usize { self.frame_limit }

    /// Number of frames waiting to be read by this end.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Device for LoopbackChannel {
    fn on_attach(&self, bridge: BridgeHandle) {
        if self.bridge.set(bridge).is_err() {
            tracing::warn!("loopback channel attached twice; keeping the first bridge");
        }
    }

    fn on_receive(&self) -> Result<(), DeviceError> {
        let frames = std::mem::take(&mut *self.inbox.lock().unwrap_or_else(PoisonError::into_inner));
        if frames.is_empty() {
            return Ok(());
        }
        let bridge = self.bridge.get().ok_or(DeviceError::Unsupported("receiving before attachment"))?;
        for frame in frames {
            bridge.pass_network_packet(&frame)?;
        }
        Ok(())
    }

    fn on_send_to_channel(&self, _permit: &WritePermit<'_>, packet: &[u8]) -> Result<usize, DeviceError> {
        let accepted = packet.len().min(self.frame_limit);
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(packet[..accepted].to_vec());
        Ok(accepted)
    }

    /// Echo the command back.
    fn on_run_command(&self, command: &[u8]) -> Result<Vec<u8>, DeviceError> { Ok(command.to_vec()) }

    fn on_who_am_i(&self) -> Vec<u8> { format!("loopback frame_limit={}", self.frame_limit).into_bytes() }

    fn is_channel(&self) -> bool { true }

    fn update_delay(&self) -> Duration { self.cadence.next_delay() }

    fn set_update_delay(&self, delay: UpdateDelay) { self.cadence.set(delay); }
}
