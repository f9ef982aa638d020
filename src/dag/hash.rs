//! Message locators.
//!
//! A [`ContentHash`] is the SHA3-512 digest of a message's bincode-encoded
//! content. It doubles as the message URI.

use crate::error::{BoardError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_512};
use std::fmt;

/// A 64-byte content hash using SHA3-512.
///
/// Binary formats (bincode, RocksDB values) carry the raw bytes; human
/// readable formats such as JSON carry the 128-character hex form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 64]);

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let hex = String::deserialize(deserializer)?;
            Self::from_hex(&hex).map_err(de::Error::custom)
        } else {
            // bincode writes bytes and byte sequences identically.
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            Self::from_slice(&bytes)
                .ok_or_else(|| de::Error::invalid_length(bytes.len(), &"64 bytes"))
        }
    }
}

impl ContentHash {
    /// SHA3-512 over the bincode encoding of `data`.
    pub fn compute<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        let encoded = bincode::serialize(data).map_err(|e| {
            BoardError::serialization(format!("Failed to serialize for hash: {}", e))
        })?;
        let digest = Sha3_512::digest(&encoded);
        Self::from_slice(&digest)
            .ok_or_else(|| BoardError::validation("SHA3-512 digest is not 64 bytes"))
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 64]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Full 128-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| BoardError::validation(format!("Invalid message URI '{}': {}", s, e)))?;
        Self::from_slice(&bytes).ok_or_else(|| {
            BoardError::validation(format!(
                "Message URI must be 128 hex characters, got {}",
                s.trim().len()
            ))
        })
    }

    /// First 16 hex characters, for logs and listings.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Returns the current Unix timestamp in milliseconds.
///
/// A clock set before the epoch yields 0 rather than panicking.
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
