//! # Arbitrator Interface
//!
//! The on-chain settlement layer, seen from the node. Queries return fresh
//! snapshots; nothing here is cached, since slashing can happen between any
//! two calls.

use async_trait::async_trait;
use chan_core::{ChannelId, EncodedBytes, ParticipantId, Timestamp};
use chan_crypto::ChannelSignature;
use chan_messages::{SignedBlock, SignedJoinChannel};
use serde::{Deserialize, Serialize};

use crate::error::ArbitrationError;
use crate::proof::Dispute;

#[async_trait]
pub trait Arbitrator: Send + Sync {
    /// Participants in the last settled snapshot, in on-chain order.
    async fn snapshot_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError>;

    /// Participants admitted since the last snapshot.
    async fn pending_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError>;

    /// Participants slashed on-chain.
    async fn slashed_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError>;

    /// Open (or join) a channel with fully co-signed join commitments.
    async fn open_channel(
        &self,
        channel_id: ChannelId,
        joins: Vec<SignedJoinChannel>,
        signatures: Vec<ChannelSignature>,
    ) -> Result<(), ArbitrationError>;

    async fn submit_dispute(&self, channel_id: ChannelId, dispute: Dispute) -> Result<(), ArbitrationError>;

    /// Post a block on-chain, with whatever confirmations were collected.
    async fn post_block_calldata(
        &self,
        channel_id: ChannelId,
        block: SignedBlock,
        confirmations: Vec<ChannelSignature>,
    ) -> Result<(), ArbitrationError>;
}

/// Progress of an on-chain dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum DisputeUpdate {
    /// A dispute was opened; each participant's head is claimed to be the
    /// given counter.
    Opened {
        fork_cnt: u64,
        claimed_heads: Vec<(ParticipantId, u64)>,
    },
    /// A response was posted for a rechallenge round.
    Rechallenge { round: u64, response: EncodedBytes },
}

/// Events emitted by the arbitrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArbitratorEvent {
    /// Settled state. Final, overrides anything local.
    SetState {
        channel_id: ChannelId,
        encoded_state: EncodedBytes,
        fork_cnt: u64,
        timestamp: Timestamp,
    },
    BlockCalldataPosted {
        channel_id: ChannelId,
        block: SignedBlock,
        /// Chain time at posting.
        timestamp: Timestamp,
    },
    DisputeUpdated {
        channel_id: ChannelId,
        update: DisputeUpdate,
    },
}

impl ArbitratorEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::SetState { channel_id, .. }
            | Self::BlockCalldataPosted { channel_id, .. }
            | Self::DisputeUpdated { channel_id, .. } => *channel_id,
        }
    }
}
