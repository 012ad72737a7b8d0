//! Registry of the bridges owned by a relay.
//!
//! `BridgeRegistry` holds the strong references that keep bridges alive.
//! Bridges only point back at their relay weakly, so removing an entry here
//! is what ultimately releases a bridge and stops its update task.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{bridge::DeviceBridge, identity::DeviceId};

/// Concurrent map of bridges keyed by [`DeviceId`].
#[derive(Debug, Default)]
pub struct BridgeRegistry(DashMap<DeviceId, Arc<DeviceBridge>>);

impl BridgeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `bridge` under its own identifier, returning any bridge it
    /// displaced.
    pub fn insert(&self, bridge: Arc<DeviceBridge>) -> Option<Arc<DeviceBridge>> {
        self.0.insert(bridge.did(), bridge)
    }

    /// Look up the bridge registered under `did`.
    #[must_use]
    pub fn get(&self, did: DeviceId) -> Option<Arc<DeviceBridge>> {
        self.0.get(&did).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the bridge registered under `did` without touching its task.
    pub fn remove(&self, did: DeviceId) -> Option<Arc<DeviceBridge>> {
        self.0.remove(&did).map(|(_, bridge)| bridge)
    }

    /// Remove the bridge registered under `did` and detach it.
    ///
    /// This is the usual body of [`Relay::detach_device`](crate::Relay::detach_device).
    pub fn detach(&self, did: DeviceId) -> Option<Arc<DeviceBridge>> {
        let bridge = self.remove(did)?;
        bridge.detach();
        Some(bridge)
    }

    /// Whether a bridge is registered under `did`.
    #[must_use]
    pub fn contains(&self, did: DeviceId) -> bool { self.0.contains_key(&did) }

    /// Number of registered bridges.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Identifiers of all registered bridges in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.0.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Remove every bridge, shutting each down and joining its update task.
    ///
    /// Shutdown failures are logged and do not stop the sweep.
    pub fn shutdown_all(&self) {
        for did in self.ids() {
            let Some(bridge) = self.remove(did) else {
                continue;
            };
            if let Err(error) = bridge.shutdown() {
                tracing::warn!(%did, %error, "bridge did not shut down cleanly");
            }
        }
    }
}
