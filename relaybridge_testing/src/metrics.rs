//! Helpers for asserting on `relaybridge` counters.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder and the snapshotter reading it.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// One counter reading: name, labels and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterReading {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: u64,
}

/// Take a single snapshot and keep its counters.
#[must_use]
pub fn counters(snapshotter: &Snapshotter) -> Vec<CounterReading> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(value) => Some(CounterReading {
                name: key.key().name().to_owned(),
                labels: key
                    .key()
                    .labels()
                    .map(|l| (l.key().to_owned(), l.value().to_owned()))
                    .collect(),
                value,
            }),
            _ => None,
        })
        .collect()
}

/// Sum of the counter `name` across readings matching `label`.
///
/// `label` of `None` matches every label set.
#[must_use]
pub fn counter_value(readings: &[CounterReading], name: &str, label: Option<(&str, &str)>) -> u64 {
    readings
        .iter()
        .filter(|reading| reading.name == name)
        .filter(|reading| {
            label.is_none_or(|(k, v)| reading.labels.iter().any(|(lk, lv)| lk == k && lv == v))
        })
        .map(|reading| reading.value)
        .sum()
}
