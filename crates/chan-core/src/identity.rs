//! # Identifier Newtypes
//!
//! `ChannelId` names a channel; `ParticipantId` names a signer. They are
//! distinct types so one can never be passed for the other.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ChanError;
use crate::hex;

/// Unique identifier of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    /// Generate a new random channel identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// A fixed identifier from a 128-bit value.
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    /// Parse a channel id from its hyphenated UUID form.
    pub fn parse(s: &str) -> Result<Self, ChanError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ChanError::InvalidValue(format!("channel id {s:?}: {e}")))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

/// Identity of a channel participant: its 32-byte Ed25519 public key.
///
/// Ordered so participant sets have a deterministic iteration order.
/// Serializes as a 64-character hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId([u8; 32]);

impl ParticipantId {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, ChanError> {
        hex::decode_array::<32>(s)
            .map(Self)
            .map_err(|e| ChanError::InvalidValue(format!("participant id: {e}")))
    }

    /// Short form used in log fields.
    pub fn short(&self) -> String {
        hex::prefix(&self.0)
    }
}

impl std::fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParticipantId({}...)", self.short())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_parse_roundtrip() {
        let id = ChannelId::new();
        let parsed = ChannelId::parse(&id.as_uuid().to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(ChannelId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn channel_id_display_prefix() {
        let id = ChannelId::new();
        assert!(id.to_string().starts_with("channel:"));
    }

    #[test]
    fn participant_hex_and_serde() {
        let p = ParticipantId::from_bytes([0xab; 32]);
        assert_eq!(p.to_hex(), "ab".repeat(32));
        let json = serde_json::to_string(&p).unwrap();
        let back: ParticipantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(ParticipantId::from_hex("abab").is_err());
    }

    #[test]
    fn participant_debug_is_short() {
        let p = ParticipantId::from_bytes([1; 32]);
        assert_eq!(format!("{p:?}"), "ParticipantId(01010101...)");
    }
}
