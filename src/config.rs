//! Bridge configuration.
//!
//! [`BridgeConfig`] bounds reassembly resource usage and selects how the
//! outbound path reacts when a transport keeps rejecting a chunk.

use std::{
    num::{NonZeroU32, NonZeroUsize},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::chunk::MIN_FRAME_SIZE;

/// Default cap on a reassembled packet (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default age after which incomplete messages are discarded.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Behaviour when a transport rejects a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry the identical chunk until it is accepted.
    #[default]
    Unbounded,
    /// Give up after `attempts` rejections, sleeping `backoff` between them.
    Limited {
        attempts: NonZeroU32,
        #[serde(with = "millis")]
        backoff: Duration,
    },
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `rejections` rejections.
    #[must_use]
    pub fn allows_retry(&self, rejections: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited { attempts, .. } => rejections < attempts.get(),
        }
    }

    /// Pause to observe before the next attempt.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        match self {
            Self::Unbounded => Duration::ZERO,
            Self::Limited { backoff, .. } => *backoff,
        }
    }
}

/// Settings applied to a [`DeviceBridge`](crate::DeviceBridge) at construction.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
/// use std::time::Duration;
/// use relaybridge::{BridgeConfig, RetryPolicy};
///
/// let config = BridgeConfig::default()
///     .with_min_frame_size(32)
///     .with_chunk_retry(RetryPolicy::Limited {
///         attempts: NonZeroU32::new(5).unwrap(),
///         backoff: Duration::from_millis(10),
///     });
/// assert_eq!(config.min_frame_size, 32);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Smallest transport frame counted as a successful chunk write.
    pub min_frame_size: usize,
    /// Hard cap on a reassembled inbound packet.
    pub max_message_size: NonZeroUsize,
    /// Age after which incomplete inbound messages are evicted.
    #[serde(with = "millis")]
    pub reassembly_timeout: Duration,
    /// Reaction to rejected chunks on the outbound path.
    pub chunk_retry: RetryPolicy,
    /// Prefix used to name update threads.
    pub thread_name_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_frame_size: MIN_FRAME_SIZE,
            max_message_size: NonZeroUsize::new(DEFAULT_MAX_MESSAGE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            chunk_retry: RetryPolicy::default(),
            thread_name_prefix: "relaybridge".to_owned(),
        }
    }
}

impl BridgeConfig {
    /// Set the minimum accepted frame size.
    #[must_use]
    pub fn with_min_frame_size(mut self, min_frame_size: usize) -> Self {
        self.min_frame_size = min_frame_size;
        self
    }

    /// Set the reassembly cap.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: NonZeroUsize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set the reassembly timeout.
    #[must_use]
    pub fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout = timeout;
        self
    }

    /// Set the chunk retry policy.
    #[must_use]
    pub fn with_chunk_retry(mut self, policy: RetryPolicy) -> Self {
        self.chunk_retry = policy;
        self
    }

    /// Set the update thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
