//! Error types for the arbitration boundary.

use chan_core::{CanonicalizationError, ChannelId, CryptoError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArbitrationError {
    /// The arbitrator could not be reached or did not answer. Retryable.
    #[error("arbitrator unavailable: {0}")]
    Unavailable(String),

    /// The arbitrator has no record of the channel.
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// The arbitrator refused the submission.
    #[error("arbitrator rejected {operation}: {reason}")]
    Rejected {
        /// The refused call, e.g. "open_channel".
        operation: String,
        reason: String,
    },

    /// The artifacts handed to the classifier do not constitute the
    /// claimed fault.
    #[error("not a {proof_type} conflict: {reason}")]
    NotAConflict { proof_type: String, reason: String },

    #[error("proof encoding failed: {0}")]
    Encoding(#[from] CanonicalizationError),

    #[error("proof decoding failed: {0}")]
    Decoding(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ArbitrationError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(ArbitrationError::Unavailable("timeout".into()).is_transient());
        assert!(!ArbitrationError::UnknownChannel(ChannelId::default()).is_transient());
        let e = ArbitrationError::Rejected {
            operation: "open_channel".into(),
            reason: "missing signatures".into(),
        };
        assert!(!e.is_transient());
        assert_eq!(e.to_string(), "arbitrator rejected open_channel: missing signatures");
    }
}
