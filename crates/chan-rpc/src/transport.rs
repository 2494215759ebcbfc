//! The network seam. Delivery is at-most-once per call; no ordering is
//! assumed across peers.

use async_trait::async_trait;
use chan_core::ParticipantId;
use chan_messages::Message;

use crate::error::RpcError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity this endpoint speaks for.
    fn local_id(&self) -> ParticipantId;

    /// Request/response to one peer. `None` when the peer handled the
    /// message without replying.
    async fn send(&self, peer: ParticipantId, message: &Message) -> Result<Option<Message>, RpcError>;

    /// Fire-and-forget to every connected peer. Returns how many peers the
    /// message was handed to.
    async fn broadcast(&self, message: &Message) -> Result<usize, RpcError>;

    /// Sever the connection to `peer`.
    async fn disconnect(&self, peer: ParticipantId);
}
