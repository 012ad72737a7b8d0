//! Command plane and device configuration passthroughs.

use std::{sync::Arc, time::Duration};

use super::DeviceBridge;
use crate::{
    device::UpdateDelay,
    error::Result,
};

impl DeviceBridge {
    /// Forward an administrative packet to the relay for delivery toward a
    /// connector. Commands bypass chunked framing.
    ///
    /// The write guard is not taken: the device is not involved, and relays
    /// commonly answer by calling [`DeviceBridge::on_command_from_connector`]
    /// on this same bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Relay`](crate::BridgeError::Relay) when the
    /// relay refuses the command, or
    /// [`BridgeError::RelayUnavailable`](crate::BridgeError::RelayUnavailable).
    pub fn post_command_to_connector(self: &Arc<Self>, packet: &[u8]) -> Result<()> {
        tracing::debug!(did = %self.did, len = packet.len(), "posting command to connector");
        self.relay()?.post_command_to_connector(packet, self)?;
        Ok(())
    }

    /// Deliver a connector-originated command to the device under the write
    /// guard.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Device`](crate::BridgeError::Device) when the
    /// device fails to execute the command.
    pub fn on_command_from_connector(&self, command: &[u8]) -> Result<()> {
        self.device
            .exclusive(|device, permit| device.on_command_from_connector(permit, command))?;
        Ok(())
    }

    /// Run a local command on the device and return its response.
    ///
    /// Not serialised against other callers; see the module documentation.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Device`](crate::BridgeError::Device) when the
    /// command fails.
    pub fn run_command(&self, command: &[u8]) -> Result<Vec<u8>> {
        Ok(self.device.shared().on_run_command(command)?)
    }

    /// Ask the device to describe itself.
    #[must_use]
    pub fn who_are_you(&self) -> Vec<u8> { self.device.shared().on_who_am_i() }

    /// Poll at a fixed cadence.
    pub fn set_update_delay(&self, delay: Duration) {
        self.device.shared().set_update_delay(UpdateDelay::Fixed(delay));
    }

    /// Poll after a random delay between `min` and `max`.
    pub fn set_update_delay_range(&self, min: Duration, max: Duration) {
        self.device.shared().set_update_delay(UpdateDelay::jitter(min, max));
    }
}
