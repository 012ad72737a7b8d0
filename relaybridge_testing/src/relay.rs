//! A relay that records everything bridges hand it.

use std::{
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use relaybridge::{BridgeRegistry, DeviceBridge, DeviceId, LogMessage, Relay, RelayError};

#[derive(Debug, Default)]
struct Journal {
    packets: Vec<(DeviceId, Vec<u8>)>,
    commands: Vec<(DeviceId, Vec<u8>)>,
    logs: Vec<(DeviceId, LogMessage)>,
    detached: Vec<DeviceId>,
}

/// Relay recording packets, commands, logs and detach requests.
///
/// Owns its bridges through [`RecordingRelay::bridges`], the way a real
/// relay would.
#[derive(Debug, Default)]
pub struct RecordingRelay {
    /// Bridges owned by this relay.
    pub bridges: BridgeRegistry,
    journal: Mutex<Journal>,
    changed: Condvar,
    refuse_packets: AtomicBool,
    route_commands_back: AtomicBool,
}

impl RecordingRelay {
    /// Create a relay ready to be handed to bridges.
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Make [`Relay::on_packet_received`] fail from now on.
    pub fn refuse_packets(&self, refuse: bool) { self.refuse_packets.store(refuse, Ordering::SeqCst); }

    /// Deliver posted commands straight back to the sending bridge's
    /// [`DeviceBridge::on_command_from_connector`].
    pub fn route_commands_back(&self, route: bool) {
        self.route_commands_back.store(route, Ordering::SeqCst);
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, f: impl FnOnce(&mut Journal)) {
        f(&mut self.journal());
        self.changed.notify_all();
    }

    /// Packets forwarded so far, in arrival order.
    #[must_use]
    pub fn packets(&self) -> Vec<(DeviceId, Vec<u8>)> { self.journal().packets.clone() }

    /// Commands posted so far.
    #[must_use]
    pub fn commands(&self) -> Vec<(DeviceId, Vec<u8>)> { self.journal().commands.clone() }

    /// Log messages received so far.
    #[must_use]
    pub fn logs(&self) -> Vec<(DeviceId, LogMessage)> { self.journal().logs.clone() }

    /// Bridges that asked to be detached.
    #[must_use]
    pub fn detached(&self) -> Vec<DeviceId> { self.journal().detached.clone() }

    /// Block until `predicate` holds for the journal or `timeout` elapses.
    fn wait_until(&self, timeout: Duration, predicate: impl Fn(&Journal) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut journal = self.journal();
        loop {
            if predicate(&journal) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            journal = self
                .changed
                .wait_timeout(journal, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wait until at least `count` packets have arrived.
    #[must_use]
    pub fn wait_for_packets(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |journal| journal.packets.len() >= count)
    }

    /// Wait until at least `count` log messages have arrived.
    #[must_use]
    pub fn wait_for_logs(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |journal| journal.logs.len() >= count)
    }
}

impl Relay for RecordingRelay {
    fn on_packet_received(&self, packet: &[u8], sender: &Arc<DeviceBridge>) -> Result<(), RelayError> {
        if self.refuse_packets.load(Ordering::SeqCst) {
            return Err(RelayError::new("packets refused"));
        }
        self.record(|journal| journal.packets.push((sender.did(), packet.to_vec())));
        Ok(())
    }

    fn post_command_to_connector(
        &self,
        packet: &[u8],
        sender: &Arc<DeviceBridge>,
    ) -> Result<(), RelayError> {
        self.record(|journal| journal.commands.push((sender.did(), packet.to_vec())));
        if self.route_commands_back.load(Ordering::SeqCst) {
            sender
                .on_command_from_connector(packet)
                .map_err(|error| RelayError::new(error.to_string()))?;
        }
        Ok(())
    }

    fn detach_device(&self, did: DeviceId) {
        self.record(|journal| journal.detached.push(did));
        self.bridges.detach(did);
    }

    fn log(&self, message: LogMessage, did: DeviceId) {
        self.record(|journal| journal.logs.push((did, message)));
    }
}
