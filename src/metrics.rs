//! Metric helpers for `relaybridge`.
//!
//! Names and helper functions wrapping the [`metrics`](https://docs.rs/metrics)
//! crate. With the `metrics` feature disabled every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Counter of chunks accepted by a transport.
pub const CHUNKS_SENT: &str = "relaybridge_chunks_sent_total";
/// Counter of chunk writes rejected by a transport and retried.
pub const CHUNK_REJECTIONS: &str = "relaybridge_chunk_rejections_total";
/// Counter of whole packets moved across a bridge.
pub const PACKETS_FORWARDED: &str = "relaybridge_packets_forwarded_total";
/// Counter of faults raised inside update loops.
pub const UPDATE_FAULTS: &str = "relaybridge_update_faults_total";

/// Direction of a forwarded packet.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Packets handed to the relay.
    Inbound,
    /// Packets written to a device.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Class of update-loop fault.
#[derive(Clone, Copy, Debug)]
pub enum FaultKind {
    /// A poll failed; the loop carried on.
    Transient,
    /// The loop itself was brought down.
    Fatal,
}

impl FaultKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            FaultKind::Transient => "transient",
            FaultKind::Fatal => "fatal",
        }
    }
}

/// Record a chunk accepted by a transport.
pub fn inc_chunks_sent() {
    #[cfg(feature = "metrics")]
    counter!(CHUNKS_SENT).increment(1);
}

/// Record a rejected chunk write.
pub fn inc_chunk_rejections() {
    #[cfg(feature = "metrics")]
    counter!(CHUNK_REJECTIONS).increment(1);
}

/// Record a packet crossing the bridge in `direction`.
pub fn inc_packets(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(PACKETS_FORWARDED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an update-loop fault.
pub fn inc_update_faults(kind: FaultKind) {
    #[cfg(feature = "metrics")]
    counter!(UPDATE_FAULTS, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
