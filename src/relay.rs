//! The contract a relay node exposes to its bridges.
//!
//! The relay owns bridges, routes reassembled packets, forwards
//! administrative commands to connectors and collects log records. Bridges
//! only ever call into it through [`Relay`].

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{bridge::DeviceBridge, identity::DeviceId};

/// Failure returned by a relay refusing a packet or command.
#[derive(Debug, Error)]
#[error("relay refused delivery: {reason}")]
pub struct RelayError {
    reason: String,
}

impl RelayError {
    /// Create an error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Return the reason given by the relay.
    #[must_use]
    pub fn reason(&self) -> &str { &self.reason }
}

/// Severity attached to a [`LogMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Information,
    Warning,
    Error,
    Debug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Debug => "debug",
        })
    }
}

/// Log record forwarded from a bridge to its relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogMessage {
    pub body: String,
    pub severity: Severity,
}

impl LogMessage {
    /// Create a record with an explicit severity.
    pub fn new(body: impl Into<String>, severity: Severity) -> Self {
        Self {
            body: body.into(),
            severity,
        }
    }

    /// Create an informational record.
    pub fn info(body: impl Into<String>) -> Self { Self::new(body, Severity::Information) }

    /// Create a warning record.
    pub fn warning(body: impl Into<String>) -> Self { Self::new(body, Severity::Warning) }

    /// Create an error record.
    pub fn error(body: impl Into<String>) -> Self { Self::new(body, Severity::Error) }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.body)
    }
}

/// Relay node as seen from a bridge.
///
/// Bridges hold their relay weakly, so implementations are expected to own the
/// bridges (for example through a [`BridgeRegistry`](crate::BridgeRegistry))
/// and not the other way round.
pub trait Relay: Send + Sync {
    /// Route a complete application packet received by `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the packet cannot be routed.
    fn on_packet_received(&self, packet: &[u8], sender: &Arc<DeviceBridge>) -> Result<(), RelayError>;

    /// Deliver an administrative packet from `sender` toward a connector.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if no connector can take the command.
    fn post_command_to_connector(
        &self,
        packet: &[u8],
        sender: &Arc<DeviceBridge>,
    ) -> Result<(), RelayError>;

    /// Remove the bridge registered under `did`.
    fn detach_device(&self, did: DeviceId);

    /// Record a log message originating from the bridge `did`.
    fn log(&self, message: LogMessage, did: DeviceId);
}
