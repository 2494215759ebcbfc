//! Leader discovery: ask any member who is in a channel.

use chan_core::{ChannelId, ParticipantId};
use chan_messages::Message;
use chan_sync::retry_if;

use crate::context::RpcContext;
use crate::error::RpcError;

/// Answer with the freshly resolved active set.
pub async fn on_can_join_leader_request(ctx: &RpcContext, channel_id: ChannelId) -> Result<Message, RpcError> {
    let participants = ctx.resolver().resolve(channel_id).await?;
    Ok(Message::CanJoinLeaderResponse {
        channel_id,
        participants,
    })
}

/// Ask `peer` for the participants of `channel_id`.
pub async fn request_leader(ctx: &RpcContext, peer: ParticipantId, channel_id: ChannelId) -> Result<Vec<ParticipantId>, RpcError> {
    let transport = ctx.transport();
    let request = Message::CanJoinLeaderRequest { channel_id };
    let request = &request;
    let reply = retry_if(&ctx.config().retry, RpcError::is_transient, || async move {
        transport.send(peer, request).await
    })
    .await
    .map_err(|e| e.into_inner())?;

    match reply {
        Some(Message::CanJoinLeaderResponse {
            channel_id: answered,
            participants,
        }) if answered == channel_id => Ok(participants),
        Some(other) => Err(RpcError::UnexpectedReply(other.kind().into())),
        None => Err(RpcError::UnexpectedReply("no reply".into())),
    }
}
