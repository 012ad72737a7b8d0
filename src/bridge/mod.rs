//! The bridge binding one [`Device`] to one [`Relay`].
//!
//! A [`DeviceBridge`] is the sole caller of its device on the outbound path
//! and the sole forwarder to its relay on the inbound path. It owns three
//! concerns:
//!
//! - chunked framing of outbound packets and reassembly of inbound chunks
//!   (see `framing`),
//! - the asymmetric bootstrap used by negotiation channels,
//! - serialised device access across the update thread and the threads of
//!   its callers (see `guard` and `update`).
//!
//! Receive-side entry points ([`DeviceBridge::on_receive`],
//! [`DeviceBridge::pass_network_packet`]) and read-only device queries are
//! not serialised by the write guard. Callers must drive them from a single
//! thread of control per bridge, normally the update thread; concurrent
//! invocation is memory-safe but the order in which packets reach the relay
//! is then unspecified.

mod builder;
mod command;
mod framing;
mod guard;
mod handle;
mod negotiation;
mod update;

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
    thread::JoinHandle,
};

pub use builder::BridgeBuilder;
pub use handle::BridgeHandle;
pub use negotiation::NegotiationArgs;

use self::{guard::DeviceGuard, update::Liveness};
use crate::{
    config::RetryPolicy,
    device::Device,
    error::{BridgeError, Result},
    identity::{DeviceId, TypeNameHash},
    qos::QualityOfService,
    relay::{LogMessage, Relay},
};

/// Role a bridge plays in the identifier negotiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeRole {
    /// Ordinary traffic with chunked framing in both directions.
    Ordinary,
    /// Bridge mediating the negotiation handshake.
    Negotiation {
        /// Whether this is the responding side of the pair.
        slave: bool,
        /// Identifiers decoded from the construction arguments.
        args: NegotiationArgs,
    },
}

impl BridgeRole {
    /// Whether this role mediates a negotiation.
    #[must_use]
    pub fn is_negotiation(&self) -> bool { matches!(self, Self::Negotiation { .. }) }

    /// Whether this role is the responding side of a negotiation.
    #[must_use]
    pub fn is_slave(&self) -> bool { matches!(self, Self::Negotiation { slave: true, .. }) }

    /// Whether inbound packets bypass reassembly.
    ///
    /// Only the initiating side of a negotiation does; the responder may have
    /// to collect a fragmented identity payload first.
    fn forwards_unframed(&self) -> bool { matches!(self, Self::Negotiation { slave: false, .. }) }
}

/// Adapter binding a transport [`Device`] to its owning [`Relay`].
pub struct DeviceBridge {
    relay: Weak<dyn Relay>,
    did: DeviceId,
    type_name_hash: TypeNameHash,
    role: BridgeRole,
    device: DeviceGuard,
    qos: Mutex<Box<dyn QualityOfService>>,
    retry: RetryPolicy,
    liveness: Arc<Liveness>,
    update_task: Mutex<Option<JoinHandle<()>>>,
    thread_name_prefix: String,
    error_status: Mutex<String>,
}

impl DeviceBridge {
    /// Start building a bridge for `device` owned by `relay`.
    pub fn builder<R: Relay + 'static>(
        relay: &Arc<R>,
        did: DeviceId,
        type_name_hash: TypeNameHash,
        device: Box<dyn Device>,
    ) -> BridgeBuilder {
        let relay = Arc::downgrade(relay);
        let relay: Weak<dyn Relay> = relay;
        BridgeBuilder::new(relay, did, type_name_hash, device)
    }

    /// Create a bridge with the default configuration.
    ///
    /// When `is_negotiation_channel` is set, `args` is decoded as
    /// [`NegotiationArgs`]; otherwise it is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidNegotiationArgs`] when a negotiation
    /// bridge receives an incomplete argument buffer.
    pub fn new<R: Relay + 'static>(
        relay: &Arc<R>,
        did: DeviceId,
        type_name_hash: TypeNameHash,
        device: Box<dyn Device>,
        is_negotiation_channel: bool,
        is_slave: bool,
        args: &[u8],
    ) -> Result<Arc<Self>> {
        let builder = Self::builder(relay, did, type_name_hash, device);
        if is_negotiation_channel {
            builder.negotiation(is_slave, args).build()
        } else {
            builder.build()
        }
    }

    /// Let the device learn the handle of this bridge.
    pub fn attach(self: &Arc<Self>) { self.device.shared().on_attach(BridgeHandle::new(self)); }

    /// Ask the owning relay to remove this bridge from its registry.
    pub fn close(&self) {
        tracing::debug!(did = %self.did, "closing bridge");
        match self.relay() {
            Ok(relay) => relay.detach_device(self.did),
            Err(error) => tracing::warn!(did = %self.did, %error, "close requested without a relay"),
        }
    }

    /// Forward a log record to the relay, tagged with this bridge's identifier.
    pub fn log(&self, message: LogMessage) {
        if let Ok(relay) = self.relay() {
            relay.log(message, self.did);
        }
    }

    /// Record the most recent device-reported error, replacing the previous one.
    pub fn set_error_status(&self, message: &str) {
        let mut status = self.error_status.lock().unwrap_or_else(PoisonError::into_inner);
        message.clone_into(&mut status);
    }

    /// Return the most recent device-reported error.
    #[must_use]
    pub fn error_status(&self) -> String {
        self.error_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Identifier of this bridge.
    #[must_use]
    pub fn did(&self) -> DeviceId { self.did }

    /// Hash of the device implementation's type name.
    #[must_use]
    pub fn type_name_hash(&self) -> TypeNameHash { self.type_name_hash }

    /// Borrow the device for read-only queries.
    #[must_use]
    pub fn device(&self) -> &dyn Device { self.device.shared() }

    /// Return the owning relay.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RelayUnavailable`] once the relay has been dropped.
    pub fn relay(&self) -> Result<Arc<dyn Relay>> {
        self.relay.upgrade().ok_or(BridgeError::RelayUnavailable)
    }

    /// Role this bridge was constructed with.
    #[must_use]
    pub fn role(&self) -> &BridgeRole { &self.role }

    /// Negotiation arguments, present only on negotiation bridges.
    #[must_use]
    pub fn negotiation_args(&self) -> Option<&NegotiationArgs> {
        match &self.role {
            BridgeRole::Negotiation { args, .. } => Some(args),
            BridgeRole::Ordinary => None,
        }
    }

    /// Whether the device is a network channel.
    #[must_use]
    pub fn is_channel(&self) -> bool { self.device.shared().is_channel() }

    /// Whether this bridge mediates a negotiation. A connector never does,
    /// whatever role it was constructed with.
    #[must_use]
    pub fn is_negotiation_channel(&self) -> bool { self.role.is_negotiation() && self.is_channel() }

    /// Whether this bridge is the responding side of a negotiation.
    #[must_use]
    pub fn is_slave(&self) -> bool { self.role.is_slave() }
}

impl fmt::Debug for DeviceBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBridge")
            .field("did", &self.did)
            .field("type_name_hash", &self.type_name_hash)
            .field("role", &self.role)
            .field("alive", &self.liveness.is_alive())
            .finish_non_exhaustive()
    }
}
