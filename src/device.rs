//! The transport endpoint contract implemented by channels and connectors.
//!
//! A [`Device`] performs the actual medium I/O. Bridges are its only caller on
//! the outbound path: the send primitive and connector-command delivery take a
//! [`WritePermit`], which only a bridge holding its write guard can mint.

use std::{
    marker::PhantomData,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use rand::Rng;
use thiserror::Error;

use crate::{bridge::BridgeHandle, error::BridgeError};

/// Failures reported by device implementations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The medium reported an I/O failure.
    #[error("device i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The device does not implement the requested capability.
    #[error("device does not support {0}")]
    Unsupported(&'static str),
    /// Free-form device failure.
    #[error("{0}")]
    Failed(String),
    /// A call back into the bridge failed while the device was handling data.
    #[error("bridge rejected device callback: {0}")]
    Bridge(#[source] Box<BridgeError>),
}

impl DeviceError {
    /// Convenience constructor for [`DeviceError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self { Self::Failed(message.into()) }
}

impl From<BridgeError> for DeviceError {
    fn from(error: BridgeError) -> Self { Self::Bridge(Box::new(error)) }
}

/// Proof that the caller holds a bridge's write guard.
///
/// Permits cannot be constructed outside this crate and cannot outlive the
/// guard that produced them.
#[derive(Debug)]
pub struct WritePermit<'guard> {
    _guard: PhantomData<&'guard ()>,
}

impl WritePermit<'_> {
    pub(crate) fn new() -> Self { Self { _guard: PhantomData } }
}

/// Interval between autonomous receive polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateDelay {
    /// Poll at a fixed cadence.
    Fixed(Duration),
    /// Poll after a delay drawn uniformly from `min..=max`.
    Jitter { min: Duration, max: Duration },
}

impl UpdateDelay {
    /// Build a jittered delay, swapping the bounds if they arrive reversed.
    #[must_use]
    pub fn jitter(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self::Jitter { min, max }
        } else {
            Self::Jitter { min: max, max: min }
        }
    }

    /// Draw the next concrete delay.
    #[must_use]
    pub fn sample(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Jitter { min, max } if min >= max => min,
            Self::Jitter { min, max } => rand::rng().random_range(min..=max),
        }
    }
}

impl Default for UpdateDelay {
    fn default() -> Self { Self::Fixed(Duration::from_millis(30)) }
}

/// Thread-safe holder of a device's [`UpdateDelay`].
///
/// Devices embed one to satisfy [`Device::update_delay`] and
/// [`Device::set_update_delay`].
#[derive(Debug, Default)]
pub struct UpdateCadence(Mutex<UpdateDelay>);

impl UpdateCadence {
    /// Create a cadence starting at `delay`.
    #[must_use]
    pub fn new(delay: UpdateDelay) -> Self { Self(Mutex::new(delay)) }

    /// Return the configured delay.
    #[must_use]
    pub fn get(&self) -> UpdateDelay { *self.0.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Replace the configured delay.
    pub fn set(&self, delay: UpdateDelay) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Draw the next concrete delay.
    #[must_use]
    pub fn next_delay(&self) -> Duration { self.get().sample() }
}

/// Medium-specific transport endpoint bound to a relay through a bridge.
///
/// All methods take `&self`; implementations keep their mutable state behind
/// interior mutability. [`Device::on_receive`], [`Device::on_run_command`] and
/// [`Device::on_who_am_i`] are called without the bridge's write guard and are
/// expected to be driven from a single thread of control per bridge.
pub trait Device: Send + Sync {
    /// Learn the handle of the bridge this device is attached to.
    fn on_attach(&self, _bridge: BridgeHandle) {}

    /// Check the medium for incoming data and hand it to the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the medium could not be read.
    fn on_receive(&self) -> Result<(), DeviceError>;

    /// Write `packet` to the medium, returning how many bytes were accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the medium rejected the write outright.
    fn on_send_to_channel(
        &self,
        _permit: &WritePermit<'_>,
        _packet: &[u8],
    ) -> Result<usize, DeviceError> {
        Err(DeviceError::Unsupported("sending to a channel"))
    }

    /// Execute a command delivered from a connector.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the command could not be executed.
    fn on_command_from_connector(
        &self,
        _permit: &WritePermit<'_>,
        _command: &[u8],
    ) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("connector commands"))
    }

    /// Execute a local command and return its response.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the command failed.
    fn on_run_command(&self, command: &[u8]) -> Result<Vec<u8>, DeviceError>;

    /// Describe this device instance.
    fn on_who_am_i(&self) -> Vec<u8>;

    /// Whether this device is a network channel rather than a connector.
    fn is_channel(&self) -> bool;

    /// Delay before the next autonomous poll.
    fn update_delay(&self) -> Duration;

    /// Change the polling cadence.
    fn set_update_delay(&self, delay: UpdateDelay);
}
