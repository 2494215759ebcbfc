//! # chan-crypto — Signature Utilities
//!
//! - **Ed25519** key pairs and signatures (`ed25519.rs`). A participant's
//!   identity is its public key.
//! - **Record signing** (`signing.rs`): canonicalize a record, hash it with
//!   SHA-256, sign the digest. `recover_signer` re-derives the digest and
//!   returns the identity that produced the signature.
//!
//! ## Security Invariant
//!
//! Nothing here signs raw bytes. Every signed payload goes through
//! [`CanonicalBytes`](chan_core::CanonicalBytes), so a record signed on
//! one peer verifies on every other.

pub mod ed25519;
pub mod signing;

pub use chan_core::CryptoError;
pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use signing::{recover_signer, record_digest, sign_record, ChannelSignature, SignedRecord};
