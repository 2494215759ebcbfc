//! # Fraud Proofs
//!
//! A [`Proof`] is the minimal evidence the arbitrator needs to re-verify a
//! fault on its own. It is encoded canonically into a [`Dispute`], the
//! record actually submitted. Each proof kind has its own typed payload;
//! there is no untyped escape hatch.

use chan_core::{CanonicalBytes, EncodedBytes, Timestamp};
use chan_crypto::ChannelSignature;
use chan_messages::SignedBlock;
use serde::{Deserialize, Serialize};

use crate::error::ArbitrationError;

/// The kind of fault a dispute proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    /// A rechallenge response contradicts an already resolved round.
    FoldRechallenge,
    /// Two different blocks signed for the same counter.
    DoubleSign,
    /// A block whose state cannot follow from its predecessor.
    IncorrectData,
    /// A newer signed state exists than the one claimed final.
    NewerState,
    /// A block at a counter already superseded by a confirmed block.
    FoldPriorBlock,
    /// A block timestamped beyond the future tolerance.
    BlockTooFarInFuture,
}

impl ProofType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoldRechallenge => "fold_rechallenge",
            Self::DoubleSign => "double_sign",
            Self::IncorrectData => "incorrect_data",
            Self::NewerState => "newer_state",
            Self::FoldPriorBlock => "fold_prior_block",
            Self::BlockTooFarInFuture => "block_too_far_in_future",
        }
    }
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence payload, one variant per [`ProofType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Proof {
    FoldRechallenge {
        round: u64,
        resolved: EncodedBytes,
        contradicting: EncodedBytes,
    },
    DoubleSign {
        first: SignedBlock,
        second: SignedBlock,
    },
    IncorrectData {
        block: SignedBlock,
        prior_state: EncodedBytes,
    },
    NewerState {
        fork_cnt: u64,
        /// The counter the counterpart claims is the head.
        claimed_transaction_cnt: u64,
        newer: SignedBlock,
    },
    FoldPriorBlock {
        stale: SignedBlock,
        superseding: SignedBlock,
        confirmations: Vec<ChannelSignature>,
    },
    BlockTooFarInFuture {
        block: SignedBlock,
        reference_time: Timestamp,
    },
}

impl Proof {
    pub fn proof_type(&self) -> ProofType {
        match self {
            Self::FoldRechallenge { .. } => ProofType::FoldRechallenge,
            Self::DoubleSign { .. } => ProofType::DoubleSign,
            Self::IncorrectData { .. } => ProofType::IncorrectData,
            Self::NewerState { .. } => ProofType::NewerState,
            Self::FoldPriorBlock { .. } => ProofType::FoldPriorBlock,
            Self::BlockTooFarInFuture { .. } => ProofType::BlockTooFarInFuture,
        }
    }
}

/// A fraud proof ready for submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    proof_type: ProofType,
    encoded_proof: EncodedBytes,
}

impl Dispute {
    /// Encode `proof` canonically.
    pub fn from_proof(proof: &Proof) -> Result<Self, ArbitrationError> {
        let canonical = CanonicalBytes::new(proof)?;
        Ok(Self {
            proof_type: proof.proof_type(),
            encoded_proof: EncodedBytes::new(canonical.into_vec()),
        })
    }

    pub fn proof_type(&self) -> ProofType {
        self.proof_type
    }

    pub fn encoded_proof(&self) -> &EncodedBytes {
        &self.encoded_proof
    }

    /// Decode the payload back into a typed proof, checking it matches the
    /// declared type.
    pub fn decode_proof(&self) -> Result<Proof, ArbitrationError> {
        let proof: Proof = serde_json::from_slice(self.encoded_proof.as_bytes())
            .map_err(|e| ArbitrationError::Decoding(e.to_string()))?;
        if proof.proof_type() != self.proof_type {
            return Err(ArbitrationError::Decoding(format!(
                "declared {} but payload is {}",
                self.proof_type,
                proof.proof_type()
            )));
        }
        Ok(proof)
    }
}
