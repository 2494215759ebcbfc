//! # Error Types
//!
//! Errors shared across the workspace. All errors use `thiserror`.
//!
//! Protocol faults (bad signature, stale block, duplicate) are not errors:
//! they are [`ExecutionFlag`](crate::ExecutionFlag) values. The types here
//! cover the cases that must be surfaced to the caller: encoding failures,
//! unverifiable signatures, and malformed identifiers.

use thiserror::Error;

/// Top-level error type for the core primitives.
#[derive(Error, Debug)]
pub enum ChanError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A value could not be parsed into a domain type.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
///
/// `VerificationFailed` is the verification error of the signature
/// utilities: malformed signatures and encoding mismatches land here.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// The record could not be canonicalized for signing or verification.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] CanonicalizationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failed_display() {
        let err = CryptoError::VerificationFailed("bad sig".to_string());
        assert!(err.to_string().contains("bad sig"));
    }

    #[test]
    fn canonicalization_converts_into_chan_error() {
        let err: ChanError = CanonicalizationError::FloatRejected(1.5).into();
        assert!(err.to_string().contains("1.5"));
    }
}
