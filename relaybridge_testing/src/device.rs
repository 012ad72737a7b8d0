//! A device whose behaviour is driven by a script.
//!
//! The device half is boxed into a bridge; the [`DeviceProbe`] half stays
//! with the test to program acceptances and poll outcomes and to inspect
//! what the bridge did.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use relaybridge::{
    BridgeHandle, Device, DeviceError, UpdateCadence, UpdateDelay, WritePermit,
};

/// How many bytes the device reports for one write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acceptance {
    /// Accept the whole buffer.
    All,
    /// Accept at most this many bytes.
    AtMost(usize),
    /// Report exactly this many bytes whatever was offered.
    Exactly(usize),
}

impl Acceptance {
    fn apply(self, offered: usize) -> usize {
        match self {
            Self::All => offered,
            Self::AtMost(limit) => offered.min(limit),
            Self::Exactly(count) => count,
        }
    }
}

/// Outcome of one scripted receive poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Deliver queued inbound frames.
    Deliver,
    /// Fail the poll with a device error.
    Fail(String),
    /// Panic inside the poll.
    Panic(String),
}

/// One write offered by the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentFrame {
    /// Bytes offered to the device.
    pub offered: Vec<u8>,
    /// Bytes the device claimed to accept.
    pub accepted: usize,
}

impl SentFrame {
    /// The prefix a real medium would have transmitted.
    #[must_use]
    pub fn transmitted(&self) -> &[u8] { &self.offered[..self.accepted.min(self.offered.len())] }
}

#[derive(Debug)]
struct State {
    is_channel: bool,
    acceptance_script: Mutex<VecDeque<Acceptance>>,
    fallback: Mutex<Acceptance>,
    writes: Mutex<Vec<SentFrame>>,
    connector_commands: Mutex<Vec<Vec<u8>>>,
    polls: Mutex<VecDeque<PollOutcome>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    receive_calls: AtomicUsize,
    writing: AtomicBool,
    overlaps: AtomicUsize,
    write_latency: Mutex<Duration>,
    cadence: UpdateCadence,
    handle: OnceLock<BridgeHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

/// Device half of the scripted pair.
#[derive(Debug)]
pub struct ScriptedDevice {
    state: Arc<State>,
}

/// Test half of the scripted pair.
#[derive(Clone, Debug)]
pub struct DeviceProbe {
    state: Arc<State>,
}

impl ScriptedDevice {
    fn pair(is_channel: bool) -> (Self, DeviceProbe) {
        let state = Arc::new(State {
            is_channel,
            acceptance_script: Mutex::default(),
            fallback: Mutex::new(Acceptance::All),
            writes: Mutex::default(),
            connector_commands: Mutex::default(),
            polls: Mutex::default(),
            inbound: Mutex::default(),
            receive_calls: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            write_latency: Mutex::new(Duration::ZERO),
            cadence: UpdateCadence::new(UpdateDelay::Fixed(Duration::from_millis(1))),
            handle: OnceLock::new(),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            DeviceProbe { state },
        )
    }

    /// A network channel accepting every write in full.
    #[must_use]
    pub fn channel() -> (Self, DeviceProbe) { Self::pair(true) }

    /// A connector; it has no send primitive.
    #[must_use]
    pub fn connector() -> (Self, DeviceProbe) { Self::pair(false) }
}

impl DeviceProbe {
    /// Queue acceptances consumed one per write before the fallback applies.
    pub fn script_acceptance(&self, script: impl IntoIterator<Item = Acceptance>) {
        lock(&self.state.acceptance_script).extend(script);
    }

    /// Acceptance used once the script is exhausted.
    pub fn set_fallback_acceptance(&self, acceptance: Acceptance) {
        *lock(&self.state.fallback) = acceptance;
    }

    /// Queue outcomes consumed one per receive poll; unscripted polls deliver.
    pub fn script_polls(&self, script: impl IntoIterator<Item = PollOutcome>) {
        lock(&self.state.polls).extend(script);
    }

    /// Queue a frame handed to the bridge on the next delivering poll.
    pub fn queue_inbound(&self, frame: impl Into<Vec<u8>>) {
        lock(&self.state.inbound).push_back(frame.into());
    }

    /// Hold each write for `latency` to widen race windows.
    pub fn set_write_latency(&self, latency: Duration) {
        *lock(&self.state.write_latency) = latency;
    }

    /// Writes offered so far.
    #[must_use]
    pub fn writes(&self) -> Vec<SentFrame> { lock(&self.state.writes).clone() }

    /// Commands delivered from a connector.
    #[must_use]
    pub fn connector_commands(&self) -> Vec<Vec<u8>> { lock(&self.state.connector_commands).clone() }

    /// Number of receive polls so far.
    #[must_use]
    pub fn receive_calls(&self) -> usize { self.state.receive_calls.load(Ordering::SeqCst) }

    /// Number of writes that started while another was in progress.
    #[must_use]
    pub fn overlapping_writes(&self) -> usize { self.state.overlaps.load(Ordering::SeqCst) }

    /// Current polling cadence.
    #[must_use]
    pub fn update_delay(&self) -> UpdateDelay { self.state.cadence.get() }

    /// Handle received at attachment, if any.
    #[must_use]
    pub fn handle(&self) -> Option<BridgeHandle> { self.state.handle.get().cloned() }
}

impl Device for ScriptedDevice {
    fn on_attach(&self, bridge: BridgeHandle) { let _ = self.state.handle.set(bridge); }

    fn on_receive(&self) -> Result<(), DeviceError> {
        self.state.receive_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.state.polls).pop_front().unwrap_or(PollOutcome::Deliver);
        match outcome {
            PollOutcome::Deliver => {}
            PollOutcome::Fail(reason) => return Err(DeviceError::Failed(reason)),
            PollOutcome::Panic(reason) => panic!("{reason}"),
        }

        let frames = std::mem::take(&mut *lock(&self.state.inbound));
        if frames.is_empty() {
            return Ok(());
        }
        let handle = self
            .state
            .handle
            .get()
            .ok_or(DeviceError::Unsupported("receiving before attachment"))?;
        for frame in frames {
            handle.pass_network_packet(&frame)?;
        }
        Ok(())
    }

    fn on_send_to_channel(&self, _permit: &WritePermit<'_>, packet: &[u8]) -> Result<usize, DeviceError> {
        if !self.state.is_channel {
            return Err(DeviceError::Unsupported("sending from a connector"));
        }
        if self.state.writing.swap(true, Ordering::SeqCst) {
            self.state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let latency = *lock(&self.state.write_latency);
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let acceptance = lock(&self.state.acceptance_script)
            .pop_front()
            .unwrap_or_else(|| *lock(&self.state.fallback));
        let accepted = acceptance.apply(packet.len());
        lock(&self.state.writes).push(SentFrame {
            offered: packet.to_vec(),
            accepted,
        });

        self.state.writing.store(false, Ordering::SeqCst);
        Ok(accepted)
    }

    fn on_command_from_connector(
        &self,
        _permit: &WritePermit<'_>,
        command: &[u8],
    ) -> Result<(), DeviceError> {
        lock(&self.state.connector_commands).push(command.to_vec());
        Ok(())
    }

    fn on_run_command(&self, command: &[u8]) -> Result<Vec<u8>, DeviceError> {
        if command.is_empty() {
            return Err(DeviceError::failed("empty command"));
        }
        let mut response = b"ran:".to_vec();
        response.extend_from_slice(command);
        Ok(response)
    }

    fn on_who_am_i(&self) -> Vec<u8> {
        if self.state.is_channel { b"scripted channel".to_vec() } else { b"scripted connector".to_vec() }
    }

    fn is_channel(&self) -> bool { self.state.is_channel }

    fn update_delay(&self) -> Duration { self.state.cadence.next_delay() }

    fn set_update_delay(&self, delay: UpdateDelay) { self.state.cadence.set(delay); }
}
