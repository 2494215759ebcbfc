//! # Dispute Classifier
//!
//! Maps a piece of conflicting evidence to exactly one [`ProofType`] and
//! packages the minimal payload for the arbitrator. Evidence is checked for
//! shape (the blocks really collide, the signatures really verify) so that
//! an honest node never submits a proof the arbitrator would throw out.
//! Whether the accused is actually at fault is the arbitrator's call.

use chan_core::{EncodedBytes, Timestamp, TolerancePolicy};
use chan_crypto::ChannelSignature;
use chan_messages::SignedBlock;

use crate::error::ArbitrationError;
use crate::proof::{Dispute, Proof, ProofType};

/// Conflicting artifacts observed by the node.
#[derive(Debug, Clone)]
pub enum Evidence {
    /// Two blocks from the same author at the same position.
    ConflictingBlocks { first: SignedBlock, second: SignedBlock },
    /// A block at a position already folded away by a fully confirmed
    /// successor.
    SupersededBlock {
        stale: SignedBlock,
        superseding: SignedBlock,
        confirmations: Vec<ChannelSignature>,
    },
    /// A block the state transition function refused.
    InvalidTransition { block: SignedBlock, prior_state: EncodedBytes },
    /// A signed block newer than the head a counterpart claims.
    NewerHead {
        fork_cnt: u64,
        claimed_transaction_cnt: u64,
        newer: SignedBlock,
    },
    /// A block whose timestamp is beyond tolerance of the reference time.
    FutureTimestamp { block: SignedBlock, reference_time: Timestamp },
    /// Two responses for the same rechallenge round.
    RechallengeContradiction {
        round: u64,
        resolved: EncodedBytes,
        contradicting: EncodedBytes,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisputeClassifier {
    tolerance: TolerancePolicy,
}

fn not_a_conflict(proof_type: ProofType, reason: impl Into<String>) -> ArbitrationError {
    ArbitrationError::NotAConflict {
        proof_type: proof_type.to_string(),
        reason: reason.into(),
    }
}

impl DisputeClassifier {
    pub fn new(tolerance: TolerancePolicy) -> Self {
        Self { tolerance }
    }

    /// Select the proof for `evidence` and encode it.
    pub fn classify(&self, evidence: Evidence) -> Result<Dispute, ArbitrationError> {
        let proof = self.select(evidence)?;
        tracing::debug!(proof_type = %proof.proof_type(), "classified dispute");
        Dispute::from_proof(&proof)
    }

    /// Select the proof for `evidence` without encoding.
    pub fn select(&self, evidence: Evidence) -> Result<Proof, ArbitrationError> {
        match evidence {
            Evidence::ConflictingBlocks { first, second } => double_sign(first, second),
            Evidence::SupersededBlock {
                stale,
                superseding,
                confirmations,
            } => fold_prior_block(stale, superseding, confirmations),
            Evidence::InvalidTransition { block, prior_state } => {
                block.verify_author()?;
                Ok(Proof::IncorrectData { block, prior_state })
            }
            Evidence::NewerHead {
                fork_cnt,
                claimed_transaction_cnt,
                newer,
            } => {
                let h = newer.header();
                if h.fork_cnt != fork_cnt || h.transaction_cnt <= claimed_transaction_cnt {
                    return Err(not_a_conflict(
                        ProofType::NewerState,
                        format!(
                            "block {}/{} is not newer than claimed head {}/{}",
                            h.fork_cnt, h.transaction_cnt, fork_cnt, claimed_transaction_cnt
                        ),
                    ));
                }
                newer.verify_author()?;
                Ok(Proof::NewerState {
                    fork_cnt,
                    claimed_transaction_cnt,
                    newer,
                })
            }
            Evidence::FutureTimestamp {
                block,
                reference_time,
            } => {
                if !self
                    .tolerance
                    .is_too_far_in_future(&block.header().timestamp, &reference_time)
                {
                    return Err(not_a_conflict(
                        ProofType::BlockTooFarInFuture,
                        format!(
                            "timestamp {} within tolerance of {}",
                            block.header().timestamp,
                            reference_time
                        ),
                    ));
                }
                block.verify_author()?;
                Ok(Proof::BlockTooFarInFuture {
                    block,
                    reference_time,
                })
            }
            Evidence::RechallengeContradiction {
                round,
                resolved,
                contradicting,
            } => {
                if resolved == contradicting {
                    return Err(not_a_conflict(
                        ProofType::FoldRechallenge,
                        "responses are identical",
                    ));
                }
                Ok(Proof::FoldRechallenge {
                    round,
                    resolved,
                    contradicting,
                })
            }
        }
    }
}

fn double_sign(first: SignedBlock, second: SignedBlock) -> Result<Proof, ArbitrationError> {
    let (a, b) = (first.header(), second.header());
    if a.participant != b.participant
        || a.fork_cnt != b.fork_cnt
        || a.transaction_cnt != b.transaction_cnt
        || a.channel_id != b.channel_id
    {
        return Err(not_a_conflict(
            ProofType::DoubleSign,
            "blocks are at different positions",
        ));
    }
    if first.digest()? == second.digest()? {
        return Err(not_a_conflict(ProofType::DoubleSign, "blocks are identical"));
    }
    first.verify_author()?;
    second.verify_author()?;
    Ok(Proof::DoubleSign { first, second })
}

fn fold_prior_block(
    stale: SignedBlock,
    superseding: SignedBlock,
    confirmations: Vec<ChannelSignature>,
) -> Result<Proof, ArbitrationError> {
    let (s, n) = (stale.header(), superseding.header());
    if s.participant != n.participant
        || s.fork_cnt != n.fork_cnt
        || s.transaction_cnt >= n.transaction_cnt
    {
        return Err(not_a_conflict(
            ProofType::FoldPriorBlock,
            format!(
                "counter {} is not below superseding counter {}",
                s.transaction_cnt, n.transaction_cnt
            ),
        ));
    }
    stale.verify_author()?;
    superseding.verify_author()?;
    for c in &confirmations {
        superseding.recover_confirmer(c)?;
    }
    Ok(Proof::FoldPriorBlock {
        stale,
        superseding,
        confirmations,
    })
}
