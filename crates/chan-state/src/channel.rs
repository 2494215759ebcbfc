//! The channel record owned by the state manager.

use chan_core::{ChannelId, EncodedBytes, ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};

/// One joined channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: ChannelId,
    /// Incremented by every settlement; never decreases locally except when
    /// the arbitrator says so.
    pub fork_cnt: u64,
    pub encoded_state: EncodedBytes,
    /// Active participants as of the last resolution.
    pub participants: Vec<ParticipantId>,
    /// Time of the last accepted update.
    pub timestamp: Timestamp,
}

impl Channel {
    /// A channel at fork 0 with `initial_state`.
    pub fn new(channel_id: ChannelId, initial_state: EncodedBytes, timestamp: Timestamp) -> Self {
        Self {
            channel_id,
            fork_cnt: 0,
            encoded_state: initial_state,
            participants: Vec::new(),
            timestamp,
        }
    }
}
