//! The closed set of messages exchanged between channel peers.

use chan_core::{ChannelId, ParticipantId};
use chan_crypto::ChannelSignature;
use serde::{Deserialize, Serialize};

use crate::block::SignedBlock;
use crate::join::SignedJoinChannel;

/// A peer-to-peer message. Tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A join commitment, optionally carrying one participant's
    /// co-signature.
    JoinChannelRequest {
        join: SignedJoinChannel,
        confirmation: Option<ChannelSignature>,
    },
    /// A newly authored block.
    SignedBlock { block: SignedBlock },
    /// A participant's acknowledgement of a block.
    BlockConfirmation {
        original: SignedBlock,
        confirmation: ChannelSignature,
    },
    /// Discovery: who is in this channel?
    CanJoinLeaderRequest { channel_id: ChannelId },
    CanJoinLeaderResponse {
        channel_id: ChannelId,
        participants: Vec<ParticipantId>,
    },
}

impl Message {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinChannelRequest { .. } => "join_channel_request",
            Self::SignedBlock { .. } => "signed_block",
            Self::BlockConfirmation { .. } => "block_confirmation",
            Self::CanJoinLeaderRequest { .. } => "can_join_leader_request",
            Self::CanJoinLeaderResponse { .. } => "can_join_leader_response",
        }
    }

    /// The channel the message refers to.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::JoinChannelRequest { join, .. } => join.join.channel_id,
            Self::SignedBlock { block } => block.header().channel_id,
            Self::BlockConfirmation { original, .. } => original.header().channel_id,
            Self::CanJoinLeaderRequest { channel_id } => *channel_id,
            Self::CanJoinLeaderResponse { channel_id, .. } => *channel_id,
        }
    }
}
