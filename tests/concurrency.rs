#![cfg(not(loom))]
//! Writes from several threads never interleave on one device.

use std::{sync::Arc, thread, time::Duration};

use relaybridge::{BridgeConfig, ChunkHeader, HEADER_SIZE, MessageId};
use relaybridge_testing::{Acceptance, RecordingRelay, ScriptedDevice, TestResult, attach_ordinary};

#[test]
fn concurrent_messages_are_written_one_at_a_time() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, probe) = ScriptedDevice::channel();
    probe.set_fallback_acceptance(Acceptance::AtMost(HEADER_SIZE + 4));
    probe.set_write_latency(Duration::from_micros(200));
    let bridge = attach_ordinary(
        &relay,
        1,
        device,
        BridgeConfig::default().with_min_frame_size(HEADER_SIZE + 4),
    )?;
    bridge.start_updating_in_separate_thread()?;

    let senders: Vec<_> = (0..4_u8)
        .map(|n| {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                (0..5).try_for_each(|_| bridge.send_framed(&[n; 16]))
            })
        })
        .collect();
    for sender in senders {
        sender.join().map_err(|_| "sender panicked")??;
    }
    bridge.shutdown()?;

    assert_eq!(probe.overlapping_writes(), 0);
    let writes = probe.writes();
    assert_eq!(writes.len(), 20 * 4);

    // Every message occupies a contiguous run of four chunks, indices 0..=3.
    let mut runs: Vec<(MessageId, Vec<u32>)> = Vec::new();
    for write in &writes {
        let (header, body) = ChunkHeader::decode(write.transmitted())?;
        assert_eq!(body.len(), 4);
        match runs.last_mut() {
            Some((id, indices)) if *id == header.message_id() => indices.push(header.chunk_index().get()),
            _ => runs.push((header.message_id(), vec![header.chunk_index().get()])),
        }
    }
    assert_eq!(runs.len(), 20);
    assert!(runs.iter().all(|(_, indices)| indices == &[0, 1, 2, 3]));
    Ok(())
}
