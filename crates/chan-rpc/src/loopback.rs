//! # Loopback Network
//!
//! An in-process transport. Each endpoint gets an unbounded inbox of
//! [`Envelope`]s carrying codec-encoded bytes, so every message crosses
//! the same encode/decode boundary it would on a real wire. Per sender,
//! delivery into each inbox is FIFO.
//!
//! Disconnections are symmetric: once either side severs the pair, neither
//! can reach the other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chan_core::ParticipantId;
use chan_messages::{decode_message, encode_message, Message};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::RpcError;
use crate::transport::Transport;

/// One delivered message.
#[derive(Debug)]
pub struct Envelope {
    pub from: ParticipantId,
    pub payload: Vec<u8>,
    /// Present for request/response sends.
    pub reply: Option<oneshot::Sender<Option<Vec<u8>>>>,
}

#[derive(Debug, Default)]
struct Hub {
    inboxes: HashMap<ParticipantId, mpsc::UnboundedSender<Envelope>>,
    severed: BTreeSet<(ParticipantId, ParticipantId)>,
    disconnects: Vec<(ParticipantId, ParticipantId)>,
}

impl Hub {
    fn is_severed(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.severed.contains(&(a.min(b), a.max(b)))
    }
}

/// Shared handle; clones address the same network.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `id`. Replaces any earlier endpoint for the same id.
    pub fn join(&self, id: ParticipantId) -> (LoopbackTransport, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.lock().inboxes.insert(id, tx);
        (
            LoopbackTransport {
                local: id,
                network: self.clone(),
            },
            rx,
        )
    }

    /// Every `(by, peer)` disconnect so far, in order.
    pub fn disconnects(&self) -> Vec<(ParticipantId, ParticipantId)> {
        self.hub.lock().disconnects.clone()
    }

    pub fn is_connected(&self, a: ParticipantId, b: ParticipantId) -> bool {
        !self.hub.lock().is_severed(a, b)
    }

    fn deliver(
        &self,
        from: ParticipantId,
        to: ParticipantId,
        payload: Vec<u8>,
        reply: Option<oneshot::Sender<Option<Vec<u8>>>>,
    ) -> Result<(), RpcError> {
        let hub = self.hub.lock();
        if hub.is_severed(from, to) {
            return Err(RpcError::Unreachable(to.short()));
        }
        let inbox = hub.inboxes.get(&to).ok_or_else(|| RpcError::Unreachable(to.short()))?;
        inbox
            .send(Envelope { from, payload, reply })
            .map_err(|_| RpcError::Unreachable(to.short()))
    }
}

/// One node's endpoint on a [`LoopbackNetwork`].
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    local: ParticipantId,
    network: LoopbackNetwork,
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn local_id(&self) -> ParticipantId {
        self.local
    }

    async fn send(&self, peer: ParticipantId, message: &Message) -> Result<Option<Message>, RpcError> {
        let payload = encode_message(message)?;
        let (tx, rx) = oneshot::channel();
        self.network.deliver(self.local, peer, payload, Some(tx))?;
        let reply = rx
            .await
            .map_err(|_| RpcError::Transport(format!("{} dropped the request", peer.short())))?;
        reply.map(|bytes| decode_message(&bytes)).transpose().map_err(RpcError::from)
    }

    async fn broadcast(&self, message: &Message) -> Result<usize, RpcError> {
        let payload = encode_message(message)?;
        let hub = self.network.hub.lock();
        let mut delivered = 0;
        for (peer, inbox) in &hub.inboxes {
            if *peer == self.local || hub.is_severed(self.local, *peer) {
                continue;
            }
            let envelope = Envelope {
                from: self.local,
                payload: payload.clone(),
                reply: None,
            };
            if inbox.send(envelope).is_ok() {
                delivered += 1;
            }
        }
        tracing::trace!(from = %self.local.short(), kind = message.kind(), delivered, "broadcast");
        Ok(delivered)
    }

    async fn disconnect(&self, peer: ParticipantId) {
        let mut hub = self.network.hub.lock();
        let pair = (self.local.min(peer), self.local.max(peer));
        if hub.severed.insert(pair) {
            hub.disconnects.push((self.local, peer));
            tracing::info!(by = %self.local.short(), peer = %peer.short(), "peer disconnected");
        }
    }
}
