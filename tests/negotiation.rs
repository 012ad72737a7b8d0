#![cfg(not(loom))]
//! Behaviour of bridges built for the identifier negotiation.

use relaybridge::{
    BridgeError,
    ChunkHeader,
    ChunkIndex,
    DeviceBridge,
    DeviceId,
    MessageId,
    NegotiationArgs,
    TypeNameHash,
};
use relaybridge_testing::{
    Acceptance,
    RecordingRelay,
    ScriptedDevice,
    TestResult,
    attach_negotiation,
};
use rstest::rstest;

fn args() -> Vec<u8> {
    NegotiationArgs::encode(&[0x41, 0x42], &[0x43, 0x44], b"extra").expect("short identifiers")
}

fn chunk(message_id: u32, index: u32, original_size: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = ChunkHeader::new(MessageId::new(message_id), ChunkIndex::new(index), original_size)
        .encode()
        .to_vec();
    out.extend_from_slice(payload);
    out
}

#[test]
fn construction_decodes_identifiers() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::channel();
    let bridge = attach_negotiation(&relay, 4, device, false, &args())?;

    let decoded = bridge.negotiation_args().ok_or("negotiation arguments missing")?;
    assert_eq!(decoded.input_id(), &[0x41, 0x42]);
    assert_eq!(decoded.output_id(), &[0x43, 0x44]);
    assert_eq!(decoded.remaining(), b"extra");
    assert!(bridge.is_negotiation_channel());
    assert!(!bridge.is_slave());
    Ok(())
}

#[test]
fn connector_is_never_a_negotiation_channel() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::connector();
    let bridge = attach_negotiation(&relay, 4, device, true, &args())?;

    assert!(!bridge.is_channel());
    assert!(!bridge.is_negotiation_channel());
    Ok(())
}

#[rstest]
#[case::empty(vec![])]
#[case::truncated_input(vec![2, 0, 0, 0, 0x41])]
#[case::missing_output(vec![1, 0, 0, 0, 0x41])]
fn malformed_arguments_prevent_construction(#[case] raw: Vec<u8>) {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::channel();

    let err = attach_negotiation(&relay, 4, device, false, &raw).expect_err("malformed arguments");

    assert!(matches!(err, BridgeError::InvalidNegotiationArgs(_)));
    assert!(err.is_fatal());
    assert!(relay.bridges.is_empty());
}

#[test]
fn ordinary_bridge_ignores_arguments() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::channel();
    let bridge = DeviceBridge::new(
        &relay,
        DeviceId::new(9),
        TypeNameHash::of("ScriptedDevice"),
        Box::new(device),
        false,
        false,
        &[0xff],
    )?;

    assert!(bridge.negotiation_args().is_none());
    assert!(!bridge.is_negotiation_channel());
    Ok(())
}

#[rstest]
#[case::text(b"hello".to_vec())]
#[case::header_lookalike(chunk(1, 0, 3, b"abc"))]
#[case::single_byte(vec![0])]
fn initiator_forwards_packets_verbatim(#[case] packet: Vec<u8>) -> TestResult {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::channel();
    let bridge = attach_negotiation(&relay, 4, device, false, &args())?;

    bridge.pass_network_packet(&packet)?;

    assert_eq!(relay.packets(), vec![(DeviceId::new(4), packet)]);
    Ok(())
}

#[test]
fn responder_reassembles_before_forwarding() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, _probe) = ScriptedDevice::channel();
    let bridge = attach_negotiation(&relay, 5, device, true, &args())?;

    bridge.pass_network_packet(&chunk(3, 1, 6, b"def"))?;
    assert!(relay.packets().is_empty());
    bridge.pass_network_packet(&chunk(3, 0, 6, b"abc"))?;

    assert_eq!(relay.packets(), vec![(DeviceId::new(5), b"abcdef".to_vec())]);
    Ok(())
}

#[rstest]
#[case::initiator(false)]
#[case::responder(true)]
fn negotiation_sends_are_unframed(#[case] is_slave: bool) -> TestResult {
    let relay = RecordingRelay::new();
    let (device, probe) = ScriptedDevice::channel();
    let bridge = attach_negotiation(&relay, 4, device, is_slave, &args())?;

    bridge.send_framed(b"identity")?;

    let writes = probe.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].offered, b"identity");
    Ok(())
}

#[test]
fn partial_negotiation_write_is_fatal() -> TestResult {
    let relay = RecordingRelay::new();
    let (device, probe) = ScriptedDevice::channel();
    probe.set_fallback_acceptance(Acceptance::AtMost(4));
    let bridge = attach_negotiation(&relay, 4, device, false, &args())?;

    let err = bridge.send_framed(&[1_u8; 10]).expect_err("truncated write");

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        BridgeError::FramingViolation {
            packet_size: 10,
            accepted: 4
        }
    ));
    assert_eq!(probe.writes().len(), 1, "negotiation writes are never retried");
    Ok(())
}
