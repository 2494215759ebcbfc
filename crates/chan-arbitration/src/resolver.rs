//! # Participant Set Resolver
//!
//! The active set is `(snapshot ∪ pending) \ slashed`, in snapshot order
//! followed by pending order. Every call queries the arbitrator again;
//! callers re-resolve before any quorum-sensitive decision.

use std::collections::BTreeSet;
use std::sync::Arc;

use chan_core::{ChannelId, ParticipantId};
use chan_sync::{retry_if, RetryPolicy};

use crate::arbitrator::Arbitrator;
use crate::error::ArbitrationError;

/// Combine the three on-chain sets into the active set.
pub fn active_participants(
    snapshot: &[ParticipantId],
    pending: &[ParticipantId],
    slashed: &[ParticipantId],
) -> Vec<ParticipantId> {
    let slashed: BTreeSet<_> = slashed.iter().collect();
    let mut seen = BTreeSet::new();
    snapshot
        .iter()
        .chain(pending)
        .filter(|p| !slashed.contains(p) && seen.insert(**p))
        .copied()
        .collect()
}

#[derive(Clone)]
pub struct ParticipantResolver {
    arbitrator: Arc<dyn Arbitrator>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ParticipantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantResolver")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ParticipantResolver {
    pub fn new(arbitrator: Arc<dyn Arbitrator>, retry: RetryPolicy) -> Self {
        Self { arbitrator, retry }
    }

    /// Query all three sets and combine them. Transient arbitrator failures
    /// are retried under the configured policy.
    pub async fn resolve(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError> {
        let arbitrator = &self.arbitrator;
        let result = retry_if(&self.retry, ArbitrationError::is_transient, || async move {
            let snapshot = arbitrator.snapshot_participants(channel_id).await?;
            let pending = arbitrator.pending_participants(channel_id).await?;
            let slashed = arbitrator.slashed_participants(channel_id).await?;
            Ok::<_, ArbitrationError>(active_participants(&snapshot, &pending, &slashed))
        })
        .await;
        match result {
            Ok(active) => {
                tracing::debug!(channel = %channel_id, active = active.len(), "resolved participants");
                Ok(active)
            }
            Err(e) => Err(e.into_inner()),
        }
    }

    /// Whether `participant` is currently active.
    pub async fn is_active(&self, channel_id: ChannelId, participant: &ParticipantId) -> Result<bool, ArbitrationError> {
        Ok(self.resolve(channel_id).await?.contains(participant))
    }
}
