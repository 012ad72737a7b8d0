#![doc(html_root_url = "https://docs.rs/relaybridge/latest")]
//! Public API for the `relaybridge` library.
//!
//! This crate binds medium-specific transport endpoints ([`Device`]s) to a
//! packet relay. Each binding is a [`DeviceBridge`] which adapts application
//! packets to transports with small or partial write capacity, mediates the
//! identifier negotiation that precedes ordinary traffic, and serialises
//! device access across its polling thread and the threads of its callers.

pub mod bridge;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod identity;
pub mod loopback;
pub mod metrics;
pub mod panic;
pub mod qos;
pub mod registry;
pub mod relay;

pub use bridge::{BridgeBuilder, BridgeHandle, BridgeRole, DeviceBridge, NegotiationArgs};
pub use chunk::{ChunkHeader, ChunkIndex, HEADER_SIZE, MIN_FRAME_SIZE, MessageId};
pub use codec::{ByteView, ByteWriter, CodecError};
pub use config::{BridgeConfig, RetryPolicy};
pub use device::{Device, DeviceError, UpdateCadence, UpdateDelay, WritePermit};
pub use error::{BridgeError, Result};
pub use identity::{DeviceId, TypeNameHash};
pub use qos::{ChunkReassembler, QualityOfService, ReassemblyError};
pub use registry::BridgeRegistry;
pub use relay::{LogMessage, Relay, RelayError, Severity};
