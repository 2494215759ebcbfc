//! # In-Memory Arbitrator
//!
//! A local stand-in for the on-chain contract. It keeps participant sets
//! per channel, checks join co-signatures on `open_channel`, records every
//! submission, and appends the events a real chain would emit. Tests and
//! the simulator drain those events into the nodes.
//!
//! `fail_next(n)` makes the next `n` calls fail with
//! `ArbitrationError::Unavailable`, to exercise retry paths.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chan_core::{ChannelId, Clock, EncodedBytes, ParticipantId, SystemClock, Timestamp};
use chan_crypto::ChannelSignature;
use chan_messages::{SignedBlock, SignedJoinChannel};
use parking_lot::Mutex;

use crate::arbitrator::{Arbitrator, ArbitratorEvent, DisputeUpdate};
use crate::error::ArbitrationError;
use crate::proof::Dispute;

#[derive(Debug, Default, Clone)]
struct ChannelRecord {
    snapshot: Vec<ParticipantId>,
    pending: Vec<ParticipantId>,
    slashed: Vec<ParticipantId>,
}

#[derive(Debug, Default)]
struct Ledger {
    channels: BTreeMap<ChannelId, ChannelRecord>,
    disputes: Vec<(ChannelId, Dispute)>,
    posted: Vec<(ChannelId, SignedBlock, Vec<ChannelSignature>)>,
    opened: Vec<(ChannelId, Vec<SignedJoinChannel>)>,
    events: Vec<ArbitratorEvent>,
    fail_next: u32,
}

pub struct InMemoryArbitrator {
    ledger: Mutex<Ledger>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryArbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("InMemoryArbitrator")
            .field("channels", &ledger.channels.len())
            .field("disputes", &ledger.disputes.len())
            .field("events", &ledger.events.len())
            .finish()
    }
}

impl Default for InMemoryArbitrator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryArbitrator {
    /// `clock` supplies chain time for posted calldata.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            clock,
        }
    }

    /// Register a channel whose settled snapshot is `participants`.
    pub fn create_channel(&self, channel_id: ChannelId, participants: Vec<ParticipantId>) {
        self.ledger.lock().channels.insert(
            channel_id,
            ChannelRecord {
                snapshot: participants,
                ..ChannelRecord::default()
            },
        );
    }

    pub fn add_pending(&self, channel_id: ChannelId, participant: ParticipantId) {
        let mut ledger = self.ledger.lock();
        let record = ledger.channels.entry(channel_id).or_default();
        if !record.pending.contains(&participant) {
            record.pending.push(participant);
        }
    }

    pub fn slash(&self, channel_id: ChannelId, participant: ParticipantId) {
        let mut ledger = self.ledger.lock();
        let record = ledger.channels.entry(channel_id).or_default();
        if !record.slashed.contains(&participant) {
            record.slashed.push(participant);
        }
    }

    /// Fail the next `n` calls as unavailable.
    pub fn fail_next(&self, n: u32) {
        self.ledger.lock().fail_next = n;
    }

    /// Settle `encoded_state` at `fork_cnt` and emit `SetState`.
    pub fn settle(&self, channel_id: ChannelId, encoded_state: EncodedBytes, fork_cnt: u64) {
        let timestamp = self.clock.now();
        let mut ledger = self.ledger.lock();
        if let Some(record) = ledger.channels.get_mut(&channel_id) {
            let pending = std::mem::take(&mut record.pending);
            record.snapshot.extend(pending);
        }
        ledger.events.push(ArbitratorEvent::SetState {
            channel_id,
            encoded_state,
            fork_cnt,
            timestamp,
        });
    }

    /// Emit a `DisputeUpdated` event.
    pub fn publish_dispute_update(&self, channel_id: ChannelId, update: DisputeUpdate) {
        self.ledger
            .lock()
            .events
            .push(ArbitratorEvent::DisputeUpdated { channel_id, update });
    }

    pub fn disputes(&self) -> Vec<(ChannelId, Dispute)> {
        self.ledger.lock().disputes.clone()
    }

    pub fn posted_blocks(&self) -> Vec<(ChannelId, SignedBlock, Vec<ChannelSignature>)> {
        self.ledger.lock().posted.clone()
    }

    pub fn opened_channels(&self) -> Vec<(ChannelId, Vec<SignedJoinChannel>)> {
        self.ledger.lock().opened.clone()
    }

    /// Take every event emitted so far.
    pub fn drain_events(&self) -> Vec<ArbitratorEvent> {
        std::mem::take(&mut self.ledger.lock().events)
    }

    fn check_available(ledger: &mut Ledger) -> Result<(), ArbitrationError> {
        if ledger.fail_next > 0 {
            ledger.fail_next -= 1;
            return Err(ArbitrationError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn record(&self, channel_id: ChannelId) -> Result<ChannelRecord, ArbitrationError> {
        let mut ledger = self.ledger.lock();
        Self::check_available(&mut ledger)?;
        ledger
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or(ArbitrationError::UnknownChannel(channel_id))
    }
}

#[async_trait]
impl Arbitrator for InMemoryArbitrator {
    async fn snapshot_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError> {
        Ok(self.record(channel_id)?.snapshot)
    }

    async fn pending_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError> {
        Ok(self.record(channel_id)?.pending)
    }

    async fn slashed_participants(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, ArbitrationError> {
        Ok(self.record(channel_id)?.slashed)
    }

    async fn open_channel(
        &self,
        channel_id: ChannelId,
        joins: Vec<SignedJoinChannel>,
        signatures: Vec<ChannelSignature>,
    ) -> Result<(), ArbitrationError> {
        let rejected = |reason: String| ArbitrationError::Rejected {
            operation: "open_channel".into(),
            reason,
        };
        let now = self.clock.now();
        let mut ledger = self.ledger.lock();
        Self::check_available(&mut ledger)?;
        let record = ledger.channels.entry(channel_id).or_default().clone();
        let members: Vec<ParticipantId> = crate::resolver::active_participants(
            &record.snapshot,
            &record.pending,
            &record.slashed,
        );

        for join in &joins {
            if join.join.channel_id != channel_id {
                return Err(rejected(format!("join for {}", join.join.channel_id)));
            }
            if join.join.is_expired(&now) {
                return Err(rejected(format!("join deadline {} passed", join.join.deadline)));
            }
            if join.recover_signer()? != join.join.participant {
                return Err(rejected("join not signed by the joiner".into()));
            }
            let mut signers: Vec<ParticipantId> = Vec::with_capacity(signatures.len());
            for sig in &signatures {
                if let Ok(signer) = join.recover_co_signer(sig) {
                    signers.push(signer);
                }
            }
            if let Some(missing) = members.iter().find(|m| !signers.contains(*m)) {
                return Err(rejected(format!("missing co-signature from {}", missing.short())));
            }
        }

        for join in &joins {
            let participant = join.join.participant;
            let record = ledger.channels.entry(channel_id).or_default();
            if !record.snapshot.contains(&participant) && !record.pending.contains(&participant) {
                record.pending.push(participant);
            }
        }
        tracing::info!(channel = %channel_id, joins = joins.len(), "channel opened");
        ledger.opened.push((channel_id, joins));
        Ok(())
    }

    async fn submit_dispute(&self, channel_id: ChannelId, dispute: Dispute) -> Result<(), ArbitrationError> {
        let mut ledger = self.ledger.lock();
        Self::check_available(&mut ledger)?;
        tracing::info!(channel = %channel_id, proof_type = %dispute.proof_type(), "dispute submitted");
        ledger.disputes.push((channel_id, dispute));
        Ok(())
    }

    async fn post_block_calldata(
        &self,
        channel_id: ChannelId,
        block: SignedBlock,
        confirmations: Vec<ChannelSignature>,
    ) -> Result<(), ArbitrationError> {
        let timestamp: Timestamp = self.clock.now();
        let mut ledger = self.ledger.lock();
        Self::check_available(&mut ledger)?;
        block.verify_author()?;
        ledger.events.push(ArbitratorEvent::BlockCalldataPosted {
            channel_id,
            block: block.clone(),
            timestamp,
        });
        ledger.posted.push((channel_id, block, confirmations));
        Ok(())
    }
}
