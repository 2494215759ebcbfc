//! # Execution Flags
//!
//! Every attempt to accept an inbound artifact (block, confirmation, join
//! request) ends in exactly one [`ExecutionFlag`]. The RPC layer maps the
//! flag to a transport action: broadcast, stay silent, sever the peer, or
//! escalate to the arbitrator.

use serde::{Deserialize, Serialize};

/// Result code of an acceptance attempt. Produced and consumed
/// synchronously; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionFlag {
    /// Accepted and applied.
    Success,
    /// Refers to a fork this node has not reached yet.
    NotReady,
    /// Already accepted; nothing to do.
    Duplicate,
    /// Protocol violation by the remote peer; sever it.
    Disconnect,
    /// Candidate fraud; escalate to the arbitrator.
    Dispute,
    /// Timestamp ahead of local time beyond tolerance.
    TimestampInFuture,
    /// Stale: the claimed timestamp is too far in the past.
    NotEnoughTime,
    /// Refers to a fork that has already been replaced.
    PastFork,
}

impl ExecutionFlag {
    /// The canonical string name of this flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::NotReady => "NOT_READY",
            Self::Duplicate => "DUPLICATE",
            Self::Disconnect => "DISCONNECT",
            Self::Dispute => "DISPUTE",
            Self::TimestampInFuture => "TIMESTAMP_IN_FUTURE",
            Self::NotEnoughTime => "NOT_ENOUGH_TIME",
            Self::PastFork => "PAST_FORK",
        }
    }

    /// Whether the artifact was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the sending peer must be dropped from the transport.
    pub fn severs_peer(&self) -> bool {
        matches!(self, Self::Disconnect | Self::Dispute)
    }
}

impl std::fmt::Display for ExecutionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
