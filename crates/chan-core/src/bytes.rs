//! # Opaque Encoded Payloads
//!
//! Channel state, block bodies and proof payloads are opaque byte
//! sequences to the replication core. `EncodedBytes` carries them and
//! serializes as hex so it can sit inside canonical JSON records.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hex;

/// An opaque byte sequence, hex-encoded on the wire.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct EncodedBytes(Vec<u8>);

impl EncodedBytes {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// An empty payload.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, String> {
        hex::decode(s).map(Self)
    }
}

impl From<Vec<u8>> for EncodedBytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for EncodedBytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl AsRef<[u8]> for EncodedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncodedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedBytes({} bytes, {}...)", self.0.len(), hex::prefix(&self.0))
    }
}

impl Serialize for EncodedBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncodedBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
