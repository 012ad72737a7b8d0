//! Non-owning handle given to devices at attachment time.

use std::sync::{Arc, Weak};

use super::DeviceBridge;
use crate::{
    error::{BridgeError, Result},
    identity::DeviceId,
    relay::LogMessage,
};

/// Weak reference from a device back to its bridge.
///
/// A handle never keeps the bridge alive. Once the relay releases the bridge,
/// every operation fails with [`BridgeError::BridgeReleased`].
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    did: DeviceId,
    bridge: Weak<DeviceBridge>,
}

impl BridgeHandle {
    pub(crate) fn new(bridge: &Arc<DeviceBridge>) -> Self {
        Self {
            did: bridge.did(),
            bridge: Arc::downgrade(bridge),
        }
    }

    /// Identifier of the bridge this handle refers to.
    #[must_use]
    pub fn did(&self) -> DeviceId { self.did }

    /// Obtain a strong reference if the bridge is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<DeviceBridge>> { self.bridge.upgrade() }

    fn bridge(&self) -> Result<Arc<DeviceBridge>> {
        self.upgrade().ok_or(BridgeError::BridgeReleased(self.did))
    }

    /// Send `packet` through the bridge's framing path.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceBridge::send_framed`] errors, or
    /// [`BridgeError::BridgeReleased`] when the bridge is gone.
    pub fn send(&self, packet: &[u8]) -> Result<()> { self.bridge()?.send_framed(packet) }

    /// Hand bytes read from the medium to the bridge's inbound path.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceBridge::pass_network_packet`] errors, or
    /// [`BridgeError::BridgeReleased`] when the bridge is gone.
    pub fn pass_network_packet(&self, packet: &[u8]) -> Result<()> {
        self.bridge()?.pass_network_packet(packet)
    }

    /// Forward an administrative packet toward a connector.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceBridge::post_command_to_connector`] errors, or
    /// [`BridgeError::BridgeReleased`] when the bridge is gone.
    pub fn post_command_to_connector(&self, packet: &[u8]) -> Result<()> {
        self.bridge()?.post_command_to_connector(packet)
    }

    /// Record the device's most recent error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BridgeReleased`] when the bridge is gone.
    pub fn set_error_status(&self, message: &str) -> Result<()> {
        self.bridge()?.set_error_status(message);
        Ok(())
    }

    /// Forward a log record to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BridgeReleased`] when the bridge is gone.
    pub fn log(&self, message: LogMessage) -> Result<()> {
        self.bridge()?.log(message);
        Ok(())
    }
}
