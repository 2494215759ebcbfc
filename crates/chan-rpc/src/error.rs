//! Error types for the RPC layer.
//!
//! Peer misbehavior is an `ExecutionFlag`, not an error. `RpcError` covers
//! local failures: the transport is down, the arbitrator refused, a record
//! could not be encoded.

use chan_arbitration::ArbitrationError;
use chan_core::{ChannelId, CryptoError};
use chan_messages::CodecError;
use chan_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(String),

    /// No route to the peer, or it was disconnected.
    #[error("peer {0} is unreachable")]
    Unreachable(String),

    #[error("channel {0} is not hosted by this node")]
    UnknownChannel(ChannelId),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl RpcError {
    /// Whether retrying may help.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Unreachable(_) => true,
            Self::Arbitration(e) => e.is_transient(),
            Self::State(StateError::Arbitration(e)) => e.is_transient(),
            _ => false,
        }
    }
}
