//! Confirmation escalation.
//!
//! An authored block that is still short of confirmations after
//! `confirmation_timeout_secs` has its calldata posted on-chain with
//! whatever confirmations were collected.

use std::sync::Arc;
use std::time::Duration;

use chan_arbitration::ArbitrationError;
use chan_messages::SignedBlock;
use chan_state::StateManager;
use chan_sync::{retry_if, ScheduledTask};
use tracing::warn;

use crate::context::RpcContext;
use crate::error::RpcError;

pub fn schedule_escalation(ctx: Arc<RpcContext>, manager: Arc<StateManager>, block: SignedBlock) -> ScheduledTask {
    let delay = Duration::from_secs(ctx.config().confirmation_timeout_secs);
    let scheduler = ctx.scheduler().clone();
    scheduler.run_after(delay, async move {
        if let Err(e) = escalate(&ctx, &manager, &block).await {
            warn!(
                channel = %block.header().channel_id,
                transaction_cnt = block.header().transaction_cnt,
                "escalation failed: {e}"
            );
        }
    })
}

/// Post `block` if some active participant has not confirmed it. Returns
/// whether it was posted.
pub async fn escalate(ctx: &RpcContext, manager: &StateManager, block: &SignedBlock) -> Result<bool, RpcError> {
    let missing = manager.missing_confirmations(block).await?;
    if missing.is_empty() {
        return Ok(false);
    }
    let channel_id = block.header().channel_id;
    warn!(
        channel = %channel_id,
        transaction_cnt = block.header().transaction_cnt,
        missing = missing.len(),
        "confirmations overdue, posting block calldata"
    );
    let confirmations = manager.collected_confirmations(block)?;
    let arbitrator = ctx.arbitrator();
    let confirmations = &confirmations;
    retry_if(&ctx.config().retry, ArbitrationError::is_transient, || async move {
        arbitrator
            .post_block_calldata(channel_id, block.clone(), confirmations.clone())
            .await
    })
    .await
    .map_err(|e| e.into_inner())?;
    Ok(true)
}
