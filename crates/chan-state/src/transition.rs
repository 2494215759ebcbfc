//! The state transition function a channel runs its blocks through.

use chan_core::EncodedBytes;
use chan_messages::Block;
use thiserror::Error;

/// The block does not follow from the prior state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transition rejected: {0}")]
pub struct TransitionError(pub String);

/// Derives the next channel state from the prior state and a block.
///
/// Must be deterministic: every honest participant applies the same block
/// to the same state and gets the same bytes.
pub trait StateTransition: Send + Sync + std::fmt::Debug {
    fn apply(&self, prior: &EncodedBytes, block: &Block) -> Result<EncodedBytes, TransitionError>;
}

/// Each block carries the full next state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceTransition;

impl StateTransition for ReplaceTransition {
    fn apply(&self, _prior: &EncodedBytes, block: &Block) -> Result<EncodedBytes, TransitionError> {
        Ok(block.body.encoded_data.clone())
    }
}
