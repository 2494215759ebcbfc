//! # chan-state — Authoritative Channel State
//!
//! The [`StateManager`] is the only component that mutates a [`Channel`].
//! Every inbound signed artifact passes through it and comes out as an
//! [`ExecutionFlag`](chan_core::ExecutionFlag), optionally with a
//! [`Dispute`](chan_arbitration::Dispute) for the arbitrator.
//!
//! All mutating operations run under the channel's
//! [`ChannelMutex`](chan_sync::ChannelMutex), so two blocks for the same
//! fork can never race. Distinct channels have distinct managers and run
//! fully in parallel.
//!
//! The [`SignatureQuorumMap`] collects co-signatures per artifact: block
//! confirmations here, join co-signatures in the RPC layer.

pub mod channel;
pub mod error;
pub mod manager;
pub mod quorum;
pub mod transition;

pub use channel::Channel;
pub use error::{QuorumError, StateError};
pub use manager::{StateManager, Verdict};
pub use quorum::SignatureQuorumMap;
pub use transition::{ReplaceTransition, StateTransition, TransitionError};
