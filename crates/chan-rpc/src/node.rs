//! # Channel Node
//!
//! One participant: a shared [`RpcContext`] plus the loops that feed it.
//! Inbound envelopes are handled one at a time in arrival order; replies
//! go back over the envelope's reply slot.

use std::sync::Arc;

use chan_arbitration::ArbitratorEvent;
use chan_core::{ChannelId, EncodedBytes, ExecutionFlag, ParticipantId};
use chan_messages::{decode_message, encode_message, BlockBody, JoinChannel, Message, SignedBlock, SignedJoinChannel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::RpcContext;
use crate::error::RpcError;
use crate::escalation::schedule_escalation;
use crate::handlers;
use crate::loopback::Envelope;
use crate::router::{dispatch, Routed};

#[derive(Debug, Clone)]
pub struct ChannelNode {
    ctx: Arc<RpcContext>,
}

impl ChannelNode {
    pub fn new(ctx: RpcContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &Arc<RpcContext> {
        &self.ctx
    }

    pub fn id(&self) -> ParticipantId {
        self.ctx.me()
    }

    /// Decode, route, and encode any reply.
    pub async fn handle_bytes(&self, from: ParticipantId, payload: &[u8]) -> Result<Option<Vec<u8>>, RpcError> {
        let message = decode_message(payload)?;
        match dispatch(&self.ctx, from, message).await? {
            Routed::Respond(reply) => Ok(Some(encode_message(&reply)?)),
            Routed::Flag(_) | Routed::Ignored => Ok(None),
        }
    }

    /// Drain `inbox` until every sender is gone.
    pub fn serve(&self, mut inbox: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let reply = match node.handle_bytes(envelope.from, &envelope.payload).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(me = %node.id().short(), from = %envelope.from.short(), "message failed: {e}");
                        None
                    }
                };
                if let Some(slot) = envelope.reply {
                    let _ = slot.send(reply);
                }
            }
            debug!(me = %node.id().short(), "inbox closed");
        })
    }

    /// Start hosting `channel_id` at fork 0.
    pub fn host(&self, channel_id: ChannelId, initial_state: EncodedBytes) {
        self.ctx.host(channel_id, initial_state);
    }

    /// Author the next block, apply it locally, and broadcast it. An
    /// accepted block is escalated on-chain if it is not fully confirmed in
    /// time.
    pub async fn propose_block(&self, channel_id: ChannelId, body: BlockBody) -> Result<(SignedBlock, ExecutionFlag), RpcError> {
        let manager = self
            .ctx
            .manager(&channel_id)
            .ok_or(RpcError::UnknownChannel(channel_id))?;
        let (block, verdict) = manager.propose(self.ctx.key(), body).await?;
        if !verdict.is_success() {
            warn!(channel = %channel_id, flag = %verdict.flag, "own block refused");
            return Ok((block, verdict.flag));
        }
        self.ctx
            .transport()
            .broadcast(&Message::SignedBlock { block: block.clone() })
            .await?;
        schedule_escalation(Arc::clone(&self.ctx), manager, block.clone());
        Ok((block, ExecutionFlag::Success))
    }

    /// Sign a join commitment for `channel_id` and broadcast it. The
    /// channel is hosted locally right away so blocks can be received once
    /// the join lands.
    pub async fn request_join(&self, channel_id: ChannelId) -> Result<SignedJoinChannel, RpcError> {
        let window = i64::try_from(self.ctx.config().join_window_secs).unwrap_or(i64::MAX);
        let join = JoinChannel {
            participant: self.id(),
            channel_id,
            deadline: self.ctx.clock().now().offset_secs(window),
        }
        .sign(self.ctx.key())?;
        self.ctx.host(channel_id, EncodedBytes::empty());
        let delivered = self
            .ctx
            .transport()
            .broadcast(&Message::JoinChannelRequest {
                join: join.clone(),
                confirmation: None,
            })
            .await?;
        info!(channel = %channel_id, delivered, "join requested");
        Ok(join)
    }

    /// Ask `peer` who is in `channel_id`.
    pub async fn request_leader(&self, peer: ParticipantId, channel_id: ChannelId) -> Result<Vec<ParticipantId>, RpcError> {
        handlers::request_leader(&self.ctx, peer, channel_id).await
    }

    /// Feed one arbitrator event into the matching state manager. Any
    /// counter-proof it yields is submitted.
    pub async fn on_arbitrator_event(&self, event: &ArbitratorEvent) -> Result<(), RpcError> {
        let channel_id = event.channel_id();
        let Some(manager) = self.ctx.manager(&channel_id) else {
            return Ok(());
        };
        match event {
            ArbitratorEvent::SetState {
                encoded_state,
                fork_cnt,
                timestamp,
                ..
            } => {
                manager.set_state(encoded_state.clone(), *fork_cnt, *timestamp).await;
            }
            ArbitratorEvent::BlockCalldataPosted { block, timestamp, .. } => {
                let verdict = manager.on_posted_block(block, *timestamp).await?;
                debug!(channel = %channel_id, flag = %verdict.flag, "posted block applied");
                if let Some(dispute) = verdict.dispute {
                    self.ctx.submit_dispute(channel_id, dispute).await?;
                }
            }
            ArbitratorEvent::DisputeUpdated { update, .. } => {
                for dispute in manager.on_dispute_update(update).await? {
                    self.ctx.submit_dispute(channel_id, dispute).await?;
                }
            }
        }
        Ok(())
    }
}
