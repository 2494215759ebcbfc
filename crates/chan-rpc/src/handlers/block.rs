//! Block propagation and confirmation.
//!
//! An accepted block is re-broadcast, then confirmed: this node signs the
//! same payload, records its own confirmation, and broadcasts it. Accepted
//! confirmations are re-broadcast in turn.

use chan_core::{ExecutionFlag, ParticipantId};
use chan_crypto::ChannelSignature;
use chan_messages::{Message, SignedBlock};
use chan_state::StateManager;
use tracing::debug;

use crate::context::RpcContext;
use crate::error::RpcError;

pub async fn on_signed_block(ctx: &RpcContext, from: ParticipantId, block: SignedBlock) -> Result<ExecutionFlag, RpcError> {
    let channel_id = block.header().channel_id;
    let Some(manager) = ctx.manager(&channel_id) else {
        debug!(channel = %channel_id, "block for a channel this node does not host");
        return Ok(ExecutionFlag::NotReady);
    };

    let verdict = manager.on_signed_block(&block).await?;
    if !verdict.is_success() {
        debug!(channel = %channel_id, peer = %from.short(), flag = %verdict.flag, "block not accepted");
        ctx.enforce(from, channel_id, &verdict).await?;
        return Ok(verdict.flag);
    }

    ctx.transport()
        .broadcast(&Message::SignedBlock { block: block.clone() })
        .await?;
    if block.header().participant != ctx.me() {
        confirm(ctx, &manager, block).await?;
    }
    Ok(ExecutionFlag::Success)
}

/// Sign, record, and broadcast this node's confirmation of `block`.
async fn confirm(ctx: &RpcContext, manager: &StateManager, block: SignedBlock) -> Result<(), RpcError> {
    let confirmation = block.confirm(ctx.key())?;
    let verdict = manager.on_block_confirmation(&block, &confirmation).await?;
    if !verdict.is_success() {
        debug!(channel = %block.header().channel_id, flag = %verdict.flag, "own confirmation not recorded");
        return Ok(());
    }
    ctx.transport()
        .broadcast(&Message::BlockConfirmation {
            original: block,
            confirmation,
        })
        .await?;
    Ok(())
}

pub async fn on_block_confirmation(
    ctx: &RpcContext,
    from: ParticipantId,
    original: SignedBlock,
    confirmation: ChannelSignature,
) -> Result<ExecutionFlag, RpcError> {
    let channel_id = original.header().channel_id;
    let Some(manager) = ctx.manager(&channel_id) else {
        return Ok(ExecutionFlag::NotReady);
    };

    let verdict = manager.on_block_confirmation(&original, &confirmation).await?;
    if !verdict.is_success() {
        debug!(channel = %channel_id, peer = %from.short(), flag = %verdict.flag, "confirmation not recorded");
        ctx.enforce(from, channel_id, &verdict).await?;
        return Ok(verdict.flag);
    }
    ctx.transport()
        .broadcast(&Message::BlockConfirmation {
            original,
            confirmation,
        })
        .await?;
    Ok(ExecutionFlag::Success)
}
