//! # RPC Context
//!
//! Everything a handler needs, built once per node and shared by
//! reference: identity key, configuration, clock, arbitrator, participant
//! resolver, transport, scheduler, the join quorum, and one
//! [`StateManager`] per hosted channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chan_arbitration::{Arbitrator, ArbitrationError, Dispute, ParticipantResolver};
use chan_core::{ChannelId, Clock, EncodedBytes, ExecutionFlag, ParticipantId};
use chan_crypto::Ed25519KeyPair;
use chan_state::{Channel, SignatureQuorumMap, StateManager, Verdict};
use chan_sync::{retry_if, ChannelMutex, Scheduler};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::RpcError;
use crate::transport::Transport;

pub struct RpcContext {
    key: Arc<Ed25519KeyPair>,
    config: NodeConfig,
    clock: Arc<dyn Clock>,
    arbitrator: Arc<dyn Arbitrator>,
    resolver: ParticipantResolver,
    transport: Arc<dyn Transport>,
    scheduler: Scheduler,
    /// Co-signatures per join commitment.
    joins: SignatureQuorumMap,
    /// Serializes join quorum mutation.
    join_lock: ChannelMutex,
    /// Join keys already submitted on-chain by this node.
    submitted_joins: Mutex<HashSet<String>>,
    channels: RwLock<HashMap<ChannelId, Arc<StateManager>>>,
}

impl std::fmt::Debug for RpcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcContext")
            .field("me", &self.me())
            .field("channels", &self.channels.read().len())
            .field("pending_joins", &self.joins.len())
            .finish_non_exhaustive()
    }
}

impl RpcContext {
    pub fn new(
        key: Ed25519KeyPair,
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        arbitrator: Arc<dyn Arbitrator>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let scheduler = Scheduler::new();
        let resolver = ParticipantResolver::new(Arc::clone(&arbitrator), config.retry);
        Self {
            key: Arc::new(key),
            config,
            clock,
            arbitrator,
            resolver,
            transport,
            joins: SignatureQuorumMap::new(scheduler.clone()),
            scheduler,
            join_lock: ChannelMutex::new(),
            submitted_joins: Mutex::new(HashSet::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn me(&self) -> ParticipantId {
        self.key.participant_id()
    }

    pub fn key(&self) -> &Ed25519KeyPair {
        &self.key
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn arbitrator(&self) -> &Arc<dyn Arbitrator> {
        &self.arbitrator
    }

    pub fn resolver(&self) -> &ParticipantResolver {
        &self.resolver
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn joins(&self) -> &SignatureQuorumMap {
        &self.joins
    }

    pub(crate) fn join_lock(&self) -> &ChannelMutex {
        &self.join_lock
    }

    /// Claim `key` for on-chain submission. False if already claimed.
    pub(crate) fn claim_join_submission(&self, key: &str) -> bool {
        self.submitted_joins.lock().insert(key.to_owned())
    }

    pub fn is_join_submitted(&self, key: &str) -> bool {
        self.submitted_joins.lock().contains(key)
    }

    pub(crate) fn release_join_submission(&self, key: &str) {
        self.submitted_joins.lock().remove(key);
    }

    pub fn manager(&self, channel_id: &ChannelId) -> Option<Arc<StateManager>> {
        self.channels.read().get(channel_id).cloned()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.read().keys().copied().collect()
    }

    /// The manager for `channel_id`, created at fork 0 with
    /// `initial_state` if this node does not host it yet.
    pub fn host(&self, channel_id: ChannelId, initial_state: EncodedBytes) -> Arc<StateManager> {
        let mut channels = self.channels.write();
        let manager = channels.entry(channel_id).or_insert_with(|| {
            info!(channel = %channel_id, me = %self.me().short(), "hosting channel");
            let channel = Channel::new(channel_id, initial_state, self.clock.now());
            Arc::new(
                StateManager::new(channel, self.resolver.clone(), Arc::clone(&self.clock))
                    .with_tolerance(self.config.tolerance),
            )
        });
        Arc::clone(manager)
    }

    /// Act on a non-success verdict about an artifact received from `from`.
    ///
    /// The peer severed is the verdict's culprit, the signer of the
    /// offending artifact. Without a verified signer, `from` answers for it.
    pub async fn enforce(&self, from: ParticipantId, channel_id: ChannelId, verdict: &Verdict) -> Result<(), RpcError> {
        if !verdict.flag.severs_peer() {
            return Ok(());
        }
        let culprit = verdict.culprit.unwrap_or(from);
        if culprit != self.me() {
            warn!(
                channel = %channel_id,
                peer = %culprit.short(),
                relayed_by = %from.short(),
                flag = %verdict.flag,
                "severing peer"
            );
            self.transport.disconnect(culprit).await;
        }
        if verdict.flag == ExecutionFlag::Dispute {
            if let Some(dispute) = &verdict.dispute {
                self.submit_dispute(channel_id, dispute.clone()).await?;
            }
        }
        Ok(())
    }

    /// Hand a dispute to the arbitrator, retrying transient failures.
    pub async fn submit_dispute(&self, channel_id: ChannelId, dispute: Dispute) -> Result<(), RpcError> {
        let arbitrator = &self.arbitrator;
        let proof_type = dispute.proof_type();
        let dispute = &dispute;
        retry_if(&self.config.retry, ArbitrationError::is_transient, || async move {
            arbitrator.submit_dispute(channel_id, dispute.clone()).await
        })
        .await
        .map_err(|e| RpcError::from(e.into_inner()))?;
        info!(channel = %channel_id, %proof_type, "dispute submitted");
        Ok(())
    }
}
