//! # chan-core — Foundational Types for the Channel Node
//!
//! Every other crate in the workspace depends on `chan-core`; it depends on
//! nothing internal. It owns the primitives the replication core is built
//! from:
//!
//! 1. **`CanonicalBytes`.** All signing and digest input flows through
//!    `CanonicalBytes::new()` (RFC 8785 JCS). Two peers encoding the same
//!    record always produce the same bytes, so a signature made on one peer
//!    verifies on every other.
//!
//! 2. **Newtype identifiers.** `ChannelId` and `ParticipantId` are distinct
//!    types. A participant key cannot be passed where a channel is expected.
//!
//! 3. **`ExecutionFlag`.** The single result code of every acceptance
//!    attempt. Protocol faults are values of this enum, never errors.
//!
//! 4. **`TolerancePolicy`.** The asymmetric clock-skew rule: stale blocks
//!    are a soft failure, blocks from the future are disputable.
//!
//! 5. **`Clock`.** Time is injected. The system clock is one implementation;
//!    tests and simulations drive a `ManualClock`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `chan-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod bytes;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod flag;
pub mod hex;
pub mod identity;
pub mod temporal;
pub mod tolerance;

// Re-export primary types for ergonomic imports.
pub use bytes::EncodedBytes;
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, ChanError, CryptoError};
pub use flag::ExecutionFlag;
pub use identity::{ChannelId, ParticipantId};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
pub use tolerance::{TolerancePolicy, TOLERANCE_FUTURE_SECS, TOLERANCE_PAST_SECS};
