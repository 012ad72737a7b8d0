//! Test doubles and fixtures for exercising `relaybridge` bridges.
//!
//! [`RecordingRelay`] captures everything a bridge forwards, [`ScriptedDevice`]
//! follows a script of partial acceptances and poll outcomes, and
//! [`logger`] serialises access to the global log capture.
//!
//! ```rust
//! use relaybridge::{DeviceBridge, DeviceId, TypeNameHash};
//! use relaybridge_testing::{RecordingRelay, ScriptedDevice};
//!
//! let relay = RecordingRelay::new();
//! let (device, probe) = ScriptedDevice::channel();
//! let bridge = DeviceBridge::new(
//!     &relay,
//!     DeviceId::new(1),
//!     TypeNameHash::of("ScriptedDevice"),
//!     Box::new(device),
//!     false,
//!     false,
//!     &[],
//! )
//! .unwrap();
//! bridge.send_framed(b"hello").unwrap();
//! assert_eq!(probe.writes().len(), 1);
//! ```

use std::sync::Arc;

use relaybridge::{BridgeConfig, DeviceBridge, DeviceId, TypeNameHash};

pub mod device;
pub mod logging;
pub mod metrics;
pub mod relay;

pub use device::{Acceptance, DeviceProbe, PollOutcome, ScriptedDevice, SentFrame};
pub use logging::{LoggerHandle, logger};
pub use metrics::{CounterReading, counter_value, counters, debugging_recorder_setup};
pub use relay::RecordingRelay;

/// Result type used by fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Build an ordinary bridge for `device`, attach it and register it with
/// `relay`.
///
/// # Errors
///
/// Propagates bridge construction errors.
pub fn attach_ordinary(
    relay: &Arc<RecordingRelay>,
    did: u16,
    device: ScriptedDevice,
    config: BridgeConfig,
) -> relaybridge::Result<Arc<DeviceBridge>> {
    let bridge = DeviceBridge::builder(relay, DeviceId::new(did), TypeNameHash::of("ScriptedDevice"), Box::new(device))
        .config(config)
        .build()?;
    register(relay, &bridge);
    Ok(bridge)
}

/// Build a negotiation bridge for `device`, attach it and register it with
/// `relay`.
///
/// # Errors
///
/// Propagates bridge construction errors, including malformed `args`.
pub fn attach_negotiation(
    relay: &Arc<RecordingRelay>,
    did: u16,
    device: ScriptedDevice,
    is_slave: bool,
    args: &[u8],
) -> relaybridge::Result<Arc<DeviceBridge>> {
    let bridge = DeviceBridge::new(
        relay,
        DeviceId::new(did),
        TypeNameHash::of("ScriptedDevice"),
        Box::new(device),
        true,
        is_slave,
        args,
    )?;
    register(relay, &bridge);
    Ok(bridge)
}

fn register(relay: &RecordingRelay, bridge: &Arc<DeviceBridge>) {
    bridge.attach();
    relay.bridges.insert(Arc::clone(bridge));
}
