//! Error types for channel state.
//!
//! Protocol faults by peers are never errors: they come back as
//! `ExecutionFlag`s. The errors here are local failures the caller must
//! handle.

use chan_arbitration::ArbitrationError;
use chan_core::CryptoError;
use thiserror::Error;

/// Signature quorum lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("no signatures collected under key {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum StateError {
    /// The active participant set could not be resolved.
    #[error("participant resolution failed: {0}")]
    Arbitration(#[from] ArbitrationError),

    /// A record could not be encoded for hashing or signing.
    #[error("record encoding failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),
}
