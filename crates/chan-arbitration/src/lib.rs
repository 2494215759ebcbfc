//! # chan-arbitration — Disputes and the Arbitrator Boundary
//!
//! - **Error** ([`error`]): failures talking to the arbitrator or packaging
//!   evidence.
//! - **Proof** ([`proof`]): the six fraud-proof kinds as a closed tagged
//!   enum, and the `Dispute` record submitted on-chain.
//! - **Classifier** ([`classifier`]): turns conflicting signed artifacts
//!   into exactly one proof. It selects evidence; it does not adjudicate.
//! - **Arbitrator** ([`arbitrator`]): the remote settlement layer as an
//!   async trait, and the events it emits.
//! - **Resolver** ([`resolver`]): the active participant set,
//!   `(snapshot ∪ pending) \ slashed`.
//! - **In-memory arbitrator** ([`memory`]): a complete local stand-in for
//!   tests and simulation.

pub mod arbitrator;
pub mod classifier;
pub mod error;
pub mod memory;
pub mod proof;
pub mod resolver;

pub use arbitrator::{Arbitrator, ArbitratorEvent, DisputeUpdate};
pub use classifier::{DisputeClassifier, Evidence};
pub use error::ArbitrationError;
pub use memory::InMemoryArbitrator;
pub use proof::{Dispute, Proof, ProofType};
pub use resolver::{active_participants, ParticipantResolver};
