//! # Join Handshake
//!
//! A joiner broadcasts its signed `JoinChannel` with no confirmation. Each
//! active member that accepts it co-signs the same artifact and broadcasts
//! its co-signature; everyone collects co-signatures in the join quorum,
//! keyed by the artifact digest. A member that first sees the commitment
//! through someone else's forwarded co-signature adds its own as well.
//! Once every active member has co-signed, the joiner submits the
//! commitment and the co-signatures on-chain.
//!
//! A valid co-signature from a non-member (slashed, say) is dropped with
//! `NOT_READY`; only a co-signature that fails to verify costs the sender
//! its connection.
//!
//! The quorum entry expires at the commitment's own deadline. A commitment
//! whose deadline has passed is refused before any signature is checked.

use std::time::Duration;

use chan_arbitration::ArbitrationError;
use chan_core::{ExecutionFlag, ParticipantId};
use chan_crypto::ChannelSignature;
use chan_messages::{Message, SignedJoinChannel};
use chan_sync::retry_if;
use tracing::{debug, info};

use crate::context::RpcContext;
use crate::error::RpcError;

pub async fn on_join_channel_request(
    ctx: &RpcContext,
    from: ParticipantId,
    join: SignedJoinChannel,
    confirmation: Option<ChannelSignature>,
) -> Result<ExecutionFlag, RpcError> {
    let now = ctx.clock().now();
    let channel_id = join.join.channel_id;
    if join.join.is_expired(&now) {
        debug!(channel = %channel_id, deadline = %join.join.deadline, "join commitment expired");
        return Ok(ExecutionFlag::NotEnoughTime);
    }
    match join.recover_signer() {
        Ok(signer) if signer == join.join.participant => {}
        _ => {
            debug!(channel = %channel_id, peer = %from.short(), "join not signed by the joiner");
            ctx.transport().disconnect(from).await;
            return Ok(ExecutionFlag::Disconnect);
        }
    }

    let key = join.quorum_key()?;
    if ctx.is_join_submitted(&key) {
        return Ok(ExecutionFlag::Duplicate);
    }
    let _guard = ctx.join_lock().lock().await;
    let active = ctx.resolver().resolve(channel_id).await?;
    let fresh = !ctx.joins().contains(&key);

    // Signatures to broadcast: a forwarded co-signature, then our own.
    let mut outgoing = Vec::with_capacity(2);
    if let Some(sig) = confirmation {
        let co_signer = match join.recover_co_signer(&sig) {
            Ok(co_signer) => co_signer,
            Err(e) => {
                debug!(channel = %channel_id, peer = %from.short(), "bad join co-signature: {e}");
                ctx.transport().disconnect(from).await;
                return Ok(ExecutionFlag::Disconnect);
            }
        };
        if !active.contains(&co_signer) {
            debug!(channel = %channel_id, co_signer = %co_signer.short(), "co-signature from outside the channel");
            return Ok(ExecutionFlag::NotReady);
        }
        if ctx.joins().try_insert(&key, co_signer, sig) {
            outgoing.push(sig);
        }
    }
    if active.contains(&ctx.me()) {
        let own = join.co_sign(ctx.key())?;
        if ctx.joins().try_insert(&key, ctx.me(), own) {
            outgoing.push(own);
        }
    }
    if outgoing.is_empty() {
        return Ok(if confirmation.is_some() || active.contains(&ctx.me()) {
            ExecutionFlag::Duplicate
        } else {
            ExecutionFlag::NotReady
        });
    }

    if fresh {
        let remaining = join.join.deadline.secs_since(&now).max(0);
        ctx.joins()
            .schedule_expiry(&key, Duration::from_secs(u64::try_from(remaining).unwrap_or(0)));
    }
    for signature in outgoing {
        ctx.transport()
            .broadcast(&Message::JoinChannelRequest {
                join: join.clone(),
                confirmation: Some(signature),
            })
            .await?;
    }

    if join.join.participant == ctx.me() {
        submit_if_complete(ctx, &join, &key, &active).await?;
    }
    Ok(ExecutionFlag::Success)
}

/// The joiner's side: once every active member has co-signed, open the
/// channel on-chain. Runs at most once per commitment.
async fn submit_if_complete(
    ctx: &RpcContext,
    join: &SignedJoinChannel,
    key: &str,
    active: &[ParticipantId],
) -> Result<(), RpcError> {
    if !ctx.joins().is_satisfied(key, active) || !ctx.claim_join_submission(key) {
        return Ok(());
    }
    let signatures = ctx.joins().signatures_from(key, active).map_err(chan_state::StateError::from)?;
    let channel_id = join.join.channel_id;
    let arbitrator = ctx.arbitrator();
    let (joins, signatures) = (&vec![join.clone()], &signatures);
    let result = retry_if(&ctx.config().retry, ArbitrationError::is_transient, || async move {
        arbitrator
            .open_channel(channel_id, joins.clone(), signatures.clone())
            .await
    })
    .await;

    match result {
        Ok(()) => {
            ctx.joins().remove(key);
            info!(channel = %channel_id, co_signers = signatures.len(), "join submitted");
            Ok(())
        }
        Err(e) => {
            ctx.release_join_submission(key);
            Err(e.into_inner().into())
        }
    }
}
