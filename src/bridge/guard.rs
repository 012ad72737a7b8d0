//! Exclusive access to a bridge's device on the write path.
//!
//! [`DeviceGuard`] owns the device and the per-bridge write lock. The only way
//! to obtain a [`WritePermit`], and therefore to reach the device's send
//! primitive or connector-command entry point, is [`DeviceGuard::exclusive`].

#[cfg(not(loom))]
use std::sync::Mutex;
use std::sync::PoisonError;

#[cfg(loom)]
use loom::sync::Mutex;

use crate::device::{Device, WritePermit};

pub(crate) struct DeviceGuard {
    device: Box<dyn Device>,
    write: Mutex<()>,
}

impl DeviceGuard {
    pub(crate) fn new(device: Box<dyn Device>) -> Self {
        Self {
            device,
            write: Mutex::new(()),
        }
    }

    /// Run `f` while holding the write lock.
    ///
    /// The lock guards no data, so a poisoned lock left behind by a panicking
    /// device is simply taken over.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce(&dyn Device, &WritePermit<'_>) -> R) -> R {
        let _held = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let permit = WritePermit::new();
        f(self.device.as_ref(), &permit)
    }

    /// Borrow the device for calls that do not cross the write path.
    pub(crate) fn shared(&self) -> &dyn Device { self.device.as_ref() }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use std::time::Duration;

    use loom::{
        sync::{Arc, Mutex},
        thread,
    };

    use super::DeviceGuard;
    use crate::device::{Device, DeviceError, UpdateDelay, WritePermit};

    /// Writes each packet one byte at a time so unguarded callers would
    /// interleave.
    struct ByteWiseDevice {
        medium: Arc<Mutex<Vec<u8>>>,
    }

    impl Device for ByteWiseDevice {
        fn on_receive(&self) -> Result<(), DeviceError> { Ok(()) }

        fn on_send_to_channel(
            &self,
            _permit: &WritePermit<'_>,
            packet: &[u8],
        ) -> Result<usize, DeviceError> {
            for byte in packet {
                self.medium.lock().unwrap_or_else(|e| e.into_inner()).push(*byte);
                thread::yield_now();
            }
            Ok(packet.len())
        }

        fn on_run_command(&self, _command: &[u8]) -> Result<Vec<u8>, DeviceError> { Ok(Vec::new()) }

        fn on_who_am_i(&self) -> Vec<u8> { Vec::new() }

        fn is_channel(&self) -> bool { true }

        fn update_delay(&self) -> Duration { Duration::ZERO }

        fn set_update_delay(&self, _delay: UpdateDelay) {}
    }

    #[test]
    fn exclusive_writes_never_interleave() {
        loom::model(|| {
            let medium = Arc::new(Mutex::new(Vec::new()));
            let guard = Arc::new(DeviceGuard::new(Box::new(ByteWiseDevice {
                medium: Arc::clone(&medium),
            })));

            let other = Arc::clone(&guard);
            let writer = thread::spawn(move || {
                other.exclusive(|device, permit| device.on_send_to_channel(permit, &[1, 1]))
            });
            let local = guard.exclusive(|device, permit| device.on_send_to_channel(permit, &[2, 2]));
            let remote = writer.join().expect("writer thread");

            assert!(local.is_ok() && remote.is_ok());
            let written = medium.lock().unwrap_or_else(|e| e.into_inner()).clone();
            assert!(written == [1, 1, 2, 2] || written == [2, 2, 1, 1], "interleaved: {written:?}");
        });
    }
}
