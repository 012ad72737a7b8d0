//! The autonomous update task.
//!
//! Each bridge may own one OS thread that sleeps for the device's current
//! update delay and then polls the device for received data. A failing poll
//! is logged and the loop carries on; a panic escaping the device ends the
//! task. Detaching wakes a sleeping task, which exits without polling again.

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError, Weak},
    thread,
    time::Duration,
};

use super::DeviceBridge;
use crate::{
    error::{BridgeError, Result},
    identity::DeviceId,
    metrics::{self, FaultKind},
    panic,
    relay::LogMessage,
};

/// Liveness flag with an interruptible sleep.
#[derive(Debug)]
pub(super) struct Liveness {
    alive: Mutex<bool>,
    wake: Condvar,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            alive: Mutex::new(true),
            wake: Condvar::new(),
        }
    }
}

impl Liveness {
    pub(super) fn is_alive(&self) -> bool {
        *self.alive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn kill(&self) {
        *self.alive.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.wake.notify_all();
    }

    /// Sleep for `delay` unless killed first. Returns whether still alive.
    fn sleep(&self, delay: Duration) -> bool {
        let alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        let (alive, _) = self
            .wake
            .wait_timeout_while(alive, delay, |alive| *alive)
            .unwrap_or_else(PoisonError::into_inner);
        *alive
    }
}

impl DeviceBridge {
    /// Ask the device to check its medium for received data.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Device`] when the poll fails.
    pub fn on_receive(&self) -> Result<()> {
        self.device.shared().on_receive()?;
        Ok(())
    }

    /// Mark the bridge as no longer alive.
    ///
    /// Idempotent and non-blocking. A running update task notices on its next
    /// wake; a poll already in progress completes first.
    pub fn detach(&self) {
        tracing::debug!(did = %self.did, "detaching bridge");
        self.liveness.kill();
    }

    /// Whether [`detach`](Self::detach) has not been called yet.
    #[must_use]
    pub fn is_alive(&self) -> bool { self.liveness.is_alive() }

    /// Spawn the update task on a dedicated thread named
    /// `<prefix>-<did>`.
    ///
    /// Does nothing if a task is already running. The task holds the bridge
    /// weakly and stops once the bridge is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Spawn`] if the thread cannot be created.
    pub fn start_updating_in_separate_thread(self: &Arc<Self>) -> Result<()> {
        let mut task = self.update_task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let bridge = Arc::downgrade(self);
        let liveness = Arc::clone(&self.liveness);
        let did = self.did;
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.thread_name_prefix, did))
            .spawn(move || run_update_loop(did, &bridge, &liveness))
            .map_err(BridgeError::Spawn)?;
        tracing::debug!(%did, "update task started");

        if let Some(Err(payload)) = task.replace(handle).map(thread::JoinHandle::join) {
            let panic = panic::format_panic(payload);
            tracing::warn!(%did, %panic, "previous update task died outside containment");
        }
        Ok(())
    }

    /// Detach the bridge and wait for its update task to finish.
    ///
    /// Called from the update task itself, only the detach takes effect.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TaskPanicked`] if the task died outside its
    /// panic containment.
    pub fn shutdown(&self) -> Result<()> {
        self.detach();
        let handle = self
            .update_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            return Ok(());
        }
        handle.join().map_err(|_| BridgeError::TaskPanicked)?;
        tracing::debug!(did = %self.did, "update task joined");
        Ok(())
    }
}

impl Drop for DeviceBridge {
    fn drop(&mut self) { self.liveness.kill(); }
}

fn run_update_loop(did: DeviceId, bridge: &Weak<DeviceBridge>, liveness: &Liveness) {
    let outcome = panic::contain(|| {
        loop {
            let Some(delay) = bridge.upgrade().map(|b| b.device().update_delay()) else {
                break;
            };
            if !liveness.sleep(delay) {
                break;
            }
            let Some(strong) = bridge.upgrade() else {
                break;
            };
            if let Err(error) = strong.on_receive() {
                metrics::inc_update_faults(FaultKind::Transient);
                tracing::error!(%did, %error, "error while updating");
                strong.log(LogMessage::error(format!("error while updating: {error}")));
            }
        }
    });

    if let Err(panic) = outcome {
        metrics::inc_update_faults(FaultKind::Fatal);
        tracing::error!(%did, %panic, "update task panicked, ending thread execution");
        if let Some(bridge) = bridge.upgrade() {
            bridge.log(LogMessage::error(format!(
                "fault captured, ending thread execution: {panic}"
            )));
        }
    }
    tracing::debug!(%did, "update task finished");
}
