//! # Signed Blocks
//!
//! A block is authored by one participant, signed once, and never mutated
//! afterwards. The signed payload is the canonical encoding of
//! `{header, body}`; its SHA-256 digest identifies the block everywhere
//! (duplicate detection, confirmation quorum keys, dispute evidence).

use chan_core::{ChannelId, ContentDigest, CryptoError, EncodedBytes, ParticipantId, Timestamp};
use chan_crypto::{record_digest, recover_signer, sign_record, ChannelSignature, Ed25519KeyPair};
use serde::{Deserialize, Serialize};

/// Who authored the block, where it sits in the channel's history, and when.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHeader {
    pub participant: ParticipantId,
    /// Per-participant counter within a fork; the first block is 1.
    pub transaction_cnt: u64,
    pub fork_cnt: u64,
    pub timestamp: Timestamp,
    pub channel_id: ChannelId,
}

/// The state transition carried by the block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockBody {
    pub transaction_type: u32,
    pub encoded_data: EncodedBytes,
}

/// Header and body: the payload that gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

/// A block with its author's signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    pub signature: ChannelSignature,
}

impl Block {
    /// Sign as the author. The key should belong to `header.participant`;
    /// a mismatch is caught by peers as a wrong-signer fault.
    pub fn sign(self, key: &Ed25519KeyPair) -> Result<SignedBlock, CryptoError> {
        let signed = sign_record(&self, key)?;
        Ok(SignedBlock {
            block: self,
            signature: signed.signature,
        })
    }

    /// Digest of the canonical encoding.
    pub fn digest(&self) -> Result<ContentDigest, CryptoError> {
        record_digest(self)
    }
}

impl SignedBlock {
    pub fn header(&self) -> &BlockHeader {
        &self.block.header
    }

    pub fn body(&self) -> &BlockBody {
        &self.block.body
    }

    /// Digest of the signed payload.
    pub fn digest(&self) -> Result<ContentDigest, CryptoError> {
        self.block.digest()
    }

    /// The identity whose key produced the author signature.
    pub fn recover_signer(&self) -> Result<ParticipantId, CryptoError> {
        recover_signer(&self.block, &self.signature)
    }

    /// Whether the author signature verifies and matches the header's
    /// participant.
    pub fn verify_author(&self) -> Result<(), CryptoError> {
        self.signature.verify_as(&self.block, &self.block.header.participant)
    }

    /// Produce a confirmation: `key`'s signature over the same payload.
    pub fn confirm(&self, key: &Ed25519KeyPair) -> Result<ChannelSignature, CryptoError> {
        Ok(sign_record(&self.block, key)?.signature)
    }

    /// The identity that produced a confirmation signature over this block.
    pub fn recover_confirmer(&self, confirmation: &ChannelSignature) -> Result<ParticipantId, CryptoError> {
        recover_signer(&self.block, confirmation)
    }
}
