#![cfg(not(loom))]
//! The autonomous update task: fault isolation, detach and shutdown.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::Level;
use relaybridge::{
    BridgeConfig,
    ChunkHeader,
    ChunkIndex,
    DeviceBridge,
    DeviceId,
    LogMessage,
    MessageId,
    Relay,
    RelayError,
    Severity,
    TypeNameHash,
    UpdateDelay,
};
use relaybridge_testing::{
    DeviceProbe,
    LoggerHandle,
    PollOutcome,
    RecordingRelay,
    ScriptedDevice,
    TestResult,
    attach_ordinary,
    logger,
};
use rstest::{fixture, rstest};

const PATIENCE: Duration = Duration::from_secs(5);

fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

struct Running {
    relay: Arc<RecordingRelay>,
    bridge: Arc<DeviceBridge>,
    probe: DeviceProbe,
}

#[fixture]
fn running() -> Running {
    let relay = RecordingRelay::new();
    let (device, probe) = ScriptedDevice::channel();
    let bridge = attach_ordinary(&relay, 7, device, BridgeConfig::default().with_thread_name_prefix("test"))
        .expect("bridge construction");
    Running { relay, bridge, probe }
}

#[rstest]
fn failing_poll_is_logged_and_loop_continues(running: Running) -> TestResult {
    let Running { relay, bridge, probe } = running;
    probe.script_polls([PollOutcome::Fail("medium unplugged".into())]);

    bridge.start_updating_in_separate_thread()?;

    assert!(eventually(|| probe.receive_calls() >= 3), "loop stopped after a failed poll");
    let logs = relay.logs();
    let (did, message) = logs.first().ok_or("no log forwarded")?;
    assert_eq!(*did, DeviceId::new(7));
    assert_eq!(message.severity, Severity::Error);
    assert!(message.body.contains("medium unplugged"));
    bridge.shutdown()?;
    Ok(())
}

#[rstest]
fn failing_poll_reaches_the_log_facade(running: Running, mut logger: LoggerHandle) -> TestResult {
    let Running { bridge, probe, .. } = running;
    probe.script_polls([PollOutcome::Fail("flaky radio".into())]);

    bridge.start_updating_in_separate_thread()?;
    assert!(eventually(|| probe.receive_calls() >= 2));
    bridge.shutdown()?;

    assert!(logger.saw(Level::Error, "error while updating"));
    Ok(())
}

#[rstest]
fn panic_ends_the_task_but_not_the_bridge(running: Running) -> TestResult {
    let Running { relay, bridge, probe } = running;
    probe.script_polls([PollOutcome::Panic("driver crashed".into())]);

    bridge.start_updating_in_separate_thread()?;

    assert!(relay.wait_for_logs(1, PATIENCE), "fatal fault was not reported");
    let (_, message) = relay.logs().into_iter().next().ok_or("no log forwarded")?;
    assert_eq!(message.severity, Severity::Error);
    assert!(message.body.contains("driver crashed"));

    thread::sleep(Duration::from_millis(30));
    assert_eq!(probe.receive_calls(), 1, "task kept polling after a panic");

    bridge.send_framed(b"still usable")?;
    assert_eq!(bridge.who_are_you(), b"scripted channel");
    bridge.shutdown()?;
    Ok(())
}

#[rstest]
fn detach_allows_at_most_one_more_poll(running: Running) -> TestResult {
    let Running { bridge, probe, .. } = running;
    bridge.set_update_delay(Duration::from_millis(2));
    bridge.start_updating_in_separate_thread()?;
    assert!(eventually(|| probe.receive_calls() >= 2));

    bridge.detach();
    let at_detach = probe.receive_calls();
    thread::sleep(Duration::from_millis(50));

    assert!(probe.receive_calls() <= at_detach + 1);
    assert!(!bridge.is_alive());
    assert_eq!(bridge.did(), DeviceId::new(7));
    assert!(!bridge.is_negotiation_channel());
    bridge.shutdown()?;
    Ok(())
}

#[rstest]
fn detach_wakes_a_long_sleep(running: Running) -> TestResult {
    let Running { bridge, probe, .. } = running;
    bridge.set_update_delay(Duration::from_secs(60));
    bridge.start_updating_in_separate_thread()?;

    let start = Instant::now();
    bridge.shutdown()?;

    assert!(start.elapsed() < PATIENCE);
    assert_eq!(probe.receive_calls(), 0);
    Ok(())
}

#[rstest]
fn shutdown_is_idempotent(running: Running) -> TestResult {
    let Running { bridge, .. } = running;
    bridge.start_updating_in_separate_thread()?;
    bridge.start_updating_in_separate_thread()?;

    bridge.shutdown()?;
    bridge.shutdown()?;
    bridge.detach();
    Ok(())
}

#[rstest]
fn releasing_the_bridge_stops_the_task(running: Running) -> TestResult {
    let Running { relay, bridge, probe } = running;
    bridge.start_updating_in_separate_thread()?;
    assert!(eventually(|| probe.receive_calls() >= 1));

    let did = bridge.did();
    drop(bridge);
    drop(relay.bridges.remove(did));
    thread::sleep(Duration::from_millis(20));
    let settled = probe.receive_calls();
    thread::sleep(Duration::from_millis(30));

    assert_eq!(probe.receive_calls(), settled);
    assert!(probe.handle().is_some_and(|handle| handle.upgrade().is_none()));
    Ok(())
}

#[rstest]
fn polled_chunks_reach_the_relay(running: Running) -> TestResult {
    let Running { relay, bridge, probe } = running;
    let mut chunk = ChunkHeader::new(MessageId::new(1), ChunkIndex::zero(), 4).encode().to_vec();
    chunk.extend_from_slice(b"ping");
    probe.queue_inbound(chunk);

    bridge.start_updating_in_separate_thread()?;

    assert!(relay.wait_for_packets(1, PATIENCE));
    assert_eq!(relay.packets(), vec![(DeviceId::new(7), b"ping".to_vec())]);
    bridge.shutdown()?;
    Ok(())
}

#[rstest]
fn update_delay_is_forwarded_to_the_device(running: Running) {
    let Running { bridge, probe, .. } = running;

    bridge.set_update_delay(Duration::from_millis(9));
    assert_eq!(probe.update_delay(), UpdateDelay::Fixed(Duration::from_millis(9)));

    bridge.set_update_delay_range(Duration::from_millis(20), Duration::from_millis(10));
    assert_eq!(
        probe.update_delay(),
        UpdateDelay::Jitter {
            min: Duration::from_millis(10),
            max: Duration::from_millis(20),
        }
    );
}

/// Relay whose log sink fails, taking the reporting task down with it.
struct BrokenLogSink;

impl Relay for BrokenLogSink {
    fn on_packet_received(&self, _: &[u8], _: &Arc<DeviceBridge>) -> Result<(), RelayError> { Ok(()) }

    fn post_command_to_connector(&self, _: &[u8], _: &Arc<DeviceBridge>) -> Result<(), RelayError> { Ok(()) }

    fn detach_device(&self, _: DeviceId) {}

    fn log(&self, message: LogMessage, _: DeviceId) { panic!("log sink unavailable: {message}") }
}

#[rstest]
fn restart_reports_a_task_that_died_uncontained(mut logger: LoggerHandle) -> TestResult {
    let relay = Arc::new(BrokenLogSink);
    let (device, probe) = ScriptedDevice::channel();
    let bridge = DeviceBridge::builder(&relay, DeviceId::new(9), TypeNameHash::of("ScriptedDevice"), Box::new(device))
        .build()?;
    bridge.attach();
    probe.script_polls([PollOutcome::Panic("driver crashed".into())]);

    bridge.start_updating_in_separate_thread()?;
    assert!(eventually(|| probe.receive_calls() >= 1));
    thread::sleep(Duration::from_millis(50));
    bridge.start_updating_in_separate_thread()?;
    bridge.shutdown()?;

    assert!(logger.saw(Level::Warn, "previous update task died outside containment"));
    Ok(())
}
