//! Routes a decoded message to its handler.

use chan_core::{ExecutionFlag, ParticipantId};
use chan_messages::Message;
use tracing::debug;

use crate::context::RpcContext;
use crate::error::RpcError;
use crate::handlers;

/// What came out of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// An acceptance attempt and its flag.
    Flag(ExecutionFlag),
    /// A reply to send back to the requester.
    Respond(Message),
    /// Nothing to do (an unsolicited response).
    Ignored,
}

pub async fn dispatch(ctx: &RpcContext, from: ParticipantId, message: Message) -> Result<Routed, RpcError> {
    let kind = message.kind();
    let routed = match message {
        Message::JoinChannelRequest { join, confirmation } => {
            Routed::Flag(handlers::on_join_channel_request(ctx, from, join, confirmation).await?)
        }
        Message::SignedBlock { block } => Routed::Flag(handlers::on_signed_block(ctx, from, block).await?),
        Message::BlockConfirmation {
            original,
            confirmation,
        } => Routed::Flag(handlers::on_block_confirmation(ctx, from, original, confirmation).await?),
        Message::CanJoinLeaderRequest { channel_id } => {
            Routed::Respond(handlers::on_can_join_leader_request(ctx, channel_id).await?)
        }
        Message::CanJoinLeaderResponse { .. } => Routed::Ignored,
    };
    debug!(me = %ctx.me().short(), from = %from.short(), kind, ?routed, "handled");
    Ok(routed)
}
