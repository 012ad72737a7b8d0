//! Staged construction of [`DeviceBridge`]s.
//!
//! The builder gathers the role, configuration and reassembler before the
//! bridge is shared, so a bridge is never observed half configured.

use std::sync::{Arc, Mutex, Weak};

use super::{BridgeRole, DeviceBridge, NegotiationArgs, guard::DeviceGuard, update::Liveness};
use crate::{
    config::BridgeConfig,
    device::Device,
    error::{BridgeError, Result},
    identity::{DeviceId, TypeNameHash},
    qos::{ChunkReassembler, QualityOfService},
    relay::Relay,
};

/// Builder for [`DeviceBridge`].
///
/// Obtained from [`DeviceBridge::builder`]. Without further calls it produces
/// an ordinary bridge using [`BridgeConfig::default`] and a
/// [`ChunkReassembler`] derived from that configuration.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// # use relaybridge::{Relay, RelayError, LogMessage, DeviceBridge, DeviceId};
/// # struct Node;
/// # impl Relay for Node {
/// #     fn on_packet_received(&self, _: &[u8], _: &Arc<DeviceBridge>) -> Result<(), RelayError> { Ok(()) }
/// #     fn post_command_to_connector(&self, _: &[u8], _: &Arc<DeviceBridge>) -> Result<(), RelayError> { Ok(()) }
/// #     fn detach_device(&self, _: DeviceId) {}
/// #     fn log(&self, _: LogMessage, _: DeviceId) {}
/// # }
/// use relaybridge::{BridgeConfig, TypeNameHash, loopback::LoopbackChannel};
///
/// let relay = Arc::new(Node);
/// let (near, _far) = LoopbackChannel::pair(32);
/// let bridge = DeviceBridge::builder(
///     &relay,
///     DeviceId::new(1),
///     TypeNameHash::of("LoopbackChannel"),
///     Box::new(near),
/// )
/// .config(BridgeConfig::default().with_min_frame_size(16))
/// .build()
/// .unwrap();
/// assert!(!bridge.is_negotiation_channel());
/// ```
pub struct BridgeBuilder {
    relay: Weak<dyn Relay>,
    did: DeviceId,
    type_name_hash: TypeNameHash,
    device: Box<dyn Device>,
    negotiation: Option<(bool, Vec<u8>)>,
    config: BridgeConfig,
    qos: Option<Box<dyn QualityOfService>>,
}

impl BridgeBuilder {
    pub(super) fn new(
        relay: Weak<dyn Relay>,
        did: DeviceId,
        type_name_hash: TypeNameHash,
        device: Box<dyn Device>,
    ) -> Self {
        Self {
            relay,
            did,
            type_name_hash,
            device,
            negotiation: None,
            config: BridgeConfig::default(),
            qos: None,
        }
    }

    /// Construct a negotiation bridge; `args` is decoded at [`build`](Self::build).
    #[must_use]
    pub fn negotiation(mut self, is_slave: bool, args: &[u8]) -> Self {
        self.negotiation = Some((is_slave, args.to_vec()));
        self
    }

    /// Replace the bridge configuration.
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom reassembler instead of the default [`ChunkReassembler`].
    ///
    /// The minimum frame size then comes from the supplied implementation.
    #[must_use]
    pub fn quality_of_service(mut self, qos: Box<dyn QualityOfService>) -> Self {
        self.qos = Some(qos);
        self
    }

    /// Finish construction.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidNegotiationArgs`] when negotiation
    /// arguments cannot be decoded.
    pub fn build(self) -> Result<Arc<DeviceBridge>> {
        let role = match self.negotiation {
            None => BridgeRole::Ordinary,
            Some((slave, raw)) => BridgeRole::Negotiation {
                slave,
                args: NegotiationArgs::decode(&raw).map_err(BridgeError::InvalidNegotiationArgs)?,
            },
        };
        let config = self.config;
        let qos = self.qos.unwrap_or_else(|| {
            Box::new(
                ChunkReassembler::new(config.max_message_size, config.reassembly_timeout)
                    .with_min_frame_size(config.min_frame_size),
            )
        });

        tracing::debug!(did = %self.did, ?role, "bridge constructed");
        Ok(Arc::new(DeviceBridge {
            relay: self.relay,
            did: self.did,
            type_name_hash: self.type_name_hash,
            role,
            device: DeviceGuard::new(self.device),
            qos: Mutex::new(qos),
            retry: config.chunk_retry,
            liveness: Arc::new(Liveness::default()),
            update_task: Mutex::new(None),
            thread_name_prefix: config.thread_name_prefix,
            error_status: Mutex::new(String::new()),
        }))
    }
}
