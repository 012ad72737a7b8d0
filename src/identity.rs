//! Identifiers attached to every bridge.
//!
//! [`DeviceId`] names a bridge within its relay; [`TypeNameHash`] names the
//! device implementation behind it so peers can refer to device types without
//! exchanging their names.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Process-unique identifier of a device bridge.
///
/// # Examples
///
/// ```
/// use relaybridge::DeviceId;
/// let did = DeviceId::new(3);
/// assert_eq!(did.get(), 3);
/// assert_eq!(did.to_string(), "3");
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into, Serialize, Deserialize,
)]
#[display("{_0}")]
pub struct DeviceId(u16);

impl DeviceId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u16) -> Self { Self(value) }

    /// Return the inner numeric identifier.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }
}

/// Hash of a device implementation's type name.
///
/// Computed with 32-bit FNV-1a so the value is stable across builds and
/// platforms.
///
/// # Examples
///
/// ```
/// use relaybridge::TypeNameHash;
/// assert_eq!(TypeNameHash::of("").get(), 0x811c_9dc5);
/// assert_eq!(TypeNameHash::of("a").get(), 0xe40c_292c);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
#[display("{_0:#010x}")]
pub struct TypeNameHash(u32);

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

impl TypeNameHash {
    /// Wrap an already computed hash.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Hash a type name.
    #[must_use]
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Return the raw hash value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }
}
