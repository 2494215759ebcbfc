//! # State Manager
//!
//! Sole authority over one channel's state, fork counter, and history.
//!
//! ## Block acceptance
//!
//! `on_signed_block` runs these checks in order and stops at the first
//! that fails:
//!
//! 1. Fork below ours → `PAST_FORK`; above ours → `NOT_READY`.
//! 2. Clock tolerance: stale → `NOT_ENOUGH_TIME`; too far ahead →
//!    `DISPUTE` with a `BlockTooFarInFuture` proof.
//! 3. Position already taken: same digest → `DUPLICATE`; different digest
//!    → `DISPUTE` with `DoubleSign` (block still held) or `FoldPriorBlock`
//!    (position already folded away).
//! 4. Author signature and active membership → `DISCONNECT` on failure.
//! 5. Counter must be exactly one past the author's last → else `DISPUTE`.
//! 6. Transition function → `DISPUTE` with `IncorrectData` on rejection,
//!    otherwise applied and `SUCCESS`.
//!
//! ## History folding
//!
//! A block confirmed by every active participant supersedes its author's
//! earlier blocks in this fork. Those are dropped from memory; only their
//! digests remain, so a later rewrite of one of them is recognized and
//! answered with `FoldPriorBlock`.
//!
//! ## Locking
//!
//! Every public operation that reads-then-writes takes the channel mutex
//! for its whole duration. The book itself sits behind a short-lived
//! `parking_lot` lock that is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chan_arbitration::{Dispute, DisputeClassifier, DisputeUpdate, Evidence, ParticipantResolver};
use chan_core::{
    ChannelId, Clock, ContentDigest, EncodedBytes, ExecutionFlag, ParticipantId, Timestamp, TolerancePolicy,
};
use chan_crypto::{ChannelSignature, Ed25519KeyPair};
use chan_messages::{Block, BlockBody, BlockHeader, SignedBlock};
use chan_sync::ChannelMutex;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::StateError;
use crate::quorum::SignatureQuorumMap;
use crate::transition::{ReplaceTransition, StateTransition};

/// Outcome of an acceptance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub flag: ExecutionFlag,
    /// Evidence to submit, when the flag is `DISPUTE` and a proof exists.
    pub dispute: Option<Dispute>,
    /// The signer of the offending artifact, when its signature verified.
    /// `None` means the fault lies with whoever delivered it.
    pub culprit: Option<ParticipantId>,
}

impl Verdict {
    fn disputed(culprit: ParticipantId, dispute: Option<Dispute>) -> Self {
        Self {
            flag: ExecutionFlag::Dispute,
            dispute,
            culprit: Some(culprit),
        }
    }

    fn disconnect(culprit: ParticipantId) -> Self {
        Self {
            flag: ExecutionFlag::Disconnect,
            dispute: None,
            culprit: Some(culprit),
        }
    }

    pub fn is_success(&self) -> bool {
        self.flag.is_success()
    }
}

impl From<ExecutionFlag> for Verdict {
    fn from(flag: ExecutionFlag) -> Self {
        Self {
            flag,
            dispute: None,
            culprit: None,
        }
    }
}

type Slot = (ParticipantId, u64);

#[derive(Debug, Clone)]
struct Fold {
    block: SignedBlock,
    confirmations: Vec<ChannelSignature>,
}

#[derive(Debug)]
struct ChannelBook {
    channel: Channel,
    /// Last accepted counter per author.
    heads: BTreeMap<ParticipantId, u64>,
    /// Digest of every accepted block in this fork.
    digests: BTreeMap<Slot, ContentDigest>,
    /// Accepted blocks not yet folded away.
    held: BTreeMap<Slot, SignedBlock>,
    /// Latest fully confirmed block per author.
    folds: BTreeMap<ParticipantId, Fold>,
    /// First response seen per rechallenge round.
    rechallenges: BTreeMap<u64, EncodedBytes>,
}

impl ChannelBook {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            heads: BTreeMap::new(),
            digests: BTreeMap::new(),
            held: BTreeMap::new(),
            folds: BTreeMap::new(),
            rechallenges: BTreeMap::new(),
        }
    }
}

/// What occupies a block's position already.
enum Occupant {
    Vacant,
    Same,
    Held(SignedBlock),
    Folded(Fold),
    Unknown,
}

/// Where a block came from. On-chain blocks are judged against chain time
/// and are never stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Peer,
    Chain,
}

fn confirmation_key(digest: &ContentDigest) -> String {
    format!("block:{}", digest.to_hex())
}

pub struct StateManager {
    lock: ChannelMutex,
    book: Mutex<ChannelBook>,
    confirmations: SignatureQuorumMap,
    resolver: ParticipantResolver,
    clock: Arc<dyn Clock>,
    tolerance: TolerancePolicy,
    classifier: DisputeClassifier,
    transition: Arc<dyn StateTransition>,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let book = self.book.lock();
        f.debug_struct("StateManager")
            .field("channel", &book.channel.channel_id)
            .field("fork_cnt", &book.channel.fork_cnt)
            .field("held", &book.held.len())
            .finish_non_exhaustive()
    }
}

impl StateManager {
    pub fn new(channel: Channel, resolver: ParticipantResolver, clock: Arc<dyn Clock>) -> Self {
        Self {
            lock: ChannelMutex::new(),
            book: Mutex::new(ChannelBook::new(channel)),
            confirmations: SignatureQuorumMap::default(),
            resolver,
            clock,
            tolerance: TolerancePolicy::default(),
            classifier: DisputeClassifier::default(),
            transition: Arc::new(ReplaceTransition),
        }
    }

    pub fn with_tolerance(mut self, tolerance: TolerancePolicy) -> Self {
        self.tolerance = tolerance;
        self.classifier = DisputeClassifier::new(tolerance);
        self
    }

    pub fn with_transition(mut self, transition: Arc<dyn StateTransition>) -> Self {
        self.transition = transition;
        self
    }

    // -- Reads -------------------------------------------------------------

    pub fn channel_id(&self) -> ChannelId {
        self.book.lock().channel.channel_id
    }

    pub fn fork_cnt(&self) -> u64 {
        self.book.lock().channel.fork_cnt
    }

    /// A copy of the channel record.
    pub fn snapshot(&self) -> Channel {
        self.book.lock().channel.clone()
    }

    /// Last accepted counter for `participant` in the current fork.
    pub fn head(&self, participant: &ParticipantId) -> u64 {
        self.book.lock().heads.get(participant).copied().unwrap_or(0)
    }

    pub fn resolver(&self) -> &ParticipantResolver {
        &self.resolver
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn tolerance(&self) -> TolerancePolicy {
        self.tolerance
    }

    /// Confirmation signatures collected for `block` from active
    /// participants, in arrival order.
    pub fn collected_confirmations(&self, block: &SignedBlock) -> Result<Vec<ChannelSignature>, StateError> {
        let key = confirmation_key(&block.digest()?);
        let participants = self.book.lock().channel.participants.clone();
        Ok(self
            .confirmations
            .signatures_from(&key, &participants)
            .unwrap_or_default())
    }

    /// Active participants that have not yet confirmed `block`. Empty when
    /// the block is fully confirmed, superseded, or unknown.
    pub async fn missing_confirmations(&self, block: &SignedBlock) -> Result<Vec<ParticipantId>, StateError> {
        let _guard = self.lock.lock().await;
        let h = block.header();
        let digest = block.digest()?;
        let slot = (h.participant, h.transaction_cnt);
        {
            let book = self.book.lock();
            if h.fork_cnt != book.channel.fork_cnt
                || book.digests.get(&slot) != Some(&digest)
                || !book.held.contains_key(&slot)
            {
                return Ok(Vec::new());
            }
        }
        let active = self.resolve_active(h.channel_id).await?;
        Ok(self.confirmations.missing(&confirmation_key(&digest), &active))
    }

    // -- Mutations ---------------------------------------------------------

    /// Validate and apply a block received from a peer.
    pub async fn on_signed_block(&self, block: &SignedBlock) -> Result<Verdict, StateError> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        self.accept(block, now, Origin::Peer).await
    }

    /// Apply a block posted on-chain, judged against `chain_time`.
    pub async fn on_posted_block(&self, block: &SignedBlock, chain_time: Timestamp) -> Result<Verdict, StateError> {
        let _guard = self.lock.lock().await;
        self.accept(block, chain_time, Origin::Chain).await
    }

    /// Author, sign, and apply this node's next block.
    pub async fn propose(
        &self,
        key: &Ed25519KeyPair,
        body: BlockBody,
    ) -> Result<(SignedBlock, Verdict), StateError> {
        let _guard = self.lock.lock().await;
        let me = key.participant_id();
        let now = self.clock.now();
        let header = {
            let book = self.book.lock();
            BlockHeader {
                participant: me,
                transaction_cnt: book.heads.get(&me).copied().unwrap_or(0) + 1,
                fork_cnt: book.channel.fork_cnt,
                timestamp: now,
                channel_id: book.channel.channel_id,
            }
        };
        let block = Block { header, body }.sign(key)?;
        let verdict = self.accept(&block, now, Origin::Peer).await?;
        Ok((block, verdict))
    }

    /// Record a participant's confirmation of an accepted block.
    pub async fn on_block_confirmation(
        &self,
        original: &SignedBlock,
        confirmation: &ChannelSignature,
    ) -> Result<Verdict, StateError> {
        let _guard = self.lock.lock().await;
        let h = original.header();
        if let Some(flag) = self.fork_check(h) {
            return Ok(flag.into());
        }

        let confirmer = match original.recover_confirmer(confirmation) {
            Ok(p) => p,
            Err(e) => {
                debug!(channel = %h.channel_id, "bad confirmation signature: {e}");
                return Ok(ExecutionFlag::Disconnect.into());
            }
        };
        if let Err(e) = original.verify_author() {
            debug!(channel = %h.channel_id, "confirmed block has bad author signature: {e}");
            return Ok(ExecutionFlag::Disconnect.into());
        }
        let active = self.resolve_active(h.channel_id).await?;
        if !active.contains(&confirmer) {
            debug!(channel = %h.channel_id, confirmer = %confirmer.short(), "confirmation from inactive participant");
            return Ok(Verdict::disconnect(confirmer));
        }

        let digest = original.digest()?;
        match self.occupant(h, &digest) {
            Occupant::Vacant => return Ok(ExecutionFlag::NotReady.into()),
            Occupant::Same => {}
            other => return self.conflict(original, other),
        }
        if !self.book.lock().held.contains_key(&(h.participant, h.transaction_cnt)) {
            return Ok(ExecutionFlag::Duplicate.into());
        }

        let key = confirmation_key(&digest);
        if !self.confirmations.try_insert(&key, confirmer, *confirmation) {
            return Ok(ExecutionFlag::Duplicate.into());
        }
        self.try_fold(original, &key, &active);
        Ok(ExecutionFlag::Success.into())
    }

    /// Overwrite with settled on-chain state. Always wins; clears all
    /// bookkeeping of the previous fork.
    pub async fn set_state(&self, encoded_state: EncodedBytes, fork_cnt: u64, timestamp: Timestamp) {
        let _guard = self.lock.lock().await;
        let mut book = self.book.lock();
        for digest in book.digests.values() {
            self.confirmations.remove(&confirmation_key(digest));
        }
        let previous = book.channel.fork_cnt;
        book.channel.encoded_state = encoded_state;
        book.channel.fork_cnt = fork_cnt;
        book.channel.timestamp = timestamp;
        book.heads.clear();
        book.digests.clear();
        book.held.clear();
        book.folds.clear();
        book.rechallenges.clear();
        info!(channel = %book.channel.channel_id, previous, fork = fork_cnt, "state set from arbitrator");
    }

    /// React to on-chain dispute progress. Returns counter-proofs to
    /// submit, if any.
    pub async fn on_dispute_update(&self, update: &DisputeUpdate) -> Result<Vec<Dispute>, StateError> {
        let _guard = self.lock.lock().await;
        let evidence = match update {
            DisputeUpdate::Opened {
                fork_cnt,
                claimed_heads,
            } => {
                let book = self.book.lock();
                if *fork_cnt != book.channel.fork_cnt {
                    return Ok(Vec::new());
                }
                let claimed: BTreeMap<ParticipantId, u64> = claimed_heads.iter().copied().collect();
                book.heads
                    .iter()
                    .filter_map(|(p, head)| {
                        let claimed = claimed.get(p).copied().unwrap_or(0);
                        if *head <= claimed {
                            return None;
                        }
                        book.held.get(&(*p, *head)).map(|newer| Evidence::NewerHead {
                            fork_cnt: *fork_cnt,
                            claimed_transaction_cnt: claimed,
                            newer: newer.clone(),
                        })
                    })
                    .collect::<Vec<_>>()
            }
            DisputeUpdate::Rechallenge { round, response } => {
                let mut book = self.book.lock();
                let resolved = book.rechallenges.get(round).cloned();
                match resolved {
                    None => {
                        book.rechallenges.insert(*round, response.clone());
                        Vec::new()
                    }
                    Some(r) if r == *response => Vec::new(),
                    Some(r) => vec![Evidence::RechallengeContradiction {
                        round: *round,
                        resolved: r,
                        contradicting: response.clone(),
                    }],
                }
            }
        };

        let disputes = evidence
            .into_iter()
            .map(|e| self.classifier.classify(e))
            .collect::<Result<Vec<_>, _>>()?;
        for d in &disputes {
            warn!(channel = %self.channel_id(), proof_type = %d.proof_type(), "counter-proof prepared");
        }
        Ok(disputes)
    }

    // -- Internals ---------------------------------------------------------

    async fn resolve_active(&self, channel_id: ChannelId) -> Result<Vec<ParticipantId>, StateError> {
        let active = self.resolver.resolve(channel_id).await?;
        self.book.lock().channel.participants = active.clone();
        Ok(active)
    }

    fn fork_check(&self, h: &BlockHeader) -> Option<ExecutionFlag> {
        let book = self.book.lock();
        if h.channel_id != book.channel.channel_id {
            return Some(ExecutionFlag::Disconnect);
        }
        if h.fork_cnt < book.channel.fork_cnt {
            return Some(ExecutionFlag::PastFork);
        }
        if h.fork_cnt > book.channel.fork_cnt {
            return Some(ExecutionFlag::NotReady);
        }
        None
    }

    fn occupant(&self, h: &BlockHeader, digest: &ContentDigest) -> Occupant {
        let slot = (h.participant, h.transaction_cnt);
        let book = self.book.lock();
        match book.digests.get(&slot) {
            None => Occupant::Vacant,
            Some(d) if d == digest => Occupant::Same,
            Some(_) => {
                if let Some(held) = book.held.get(&slot) {
                    Occupant::Held(held.clone())
                } else if let Some(fold) = book.folds.get(&h.participant) {
                    Occupant::Folded(fold.clone())
                } else {
                    Occupant::Unknown
                }
            }
        }
    }

    /// `block` collides with what already sits at its position.
    fn conflict(&self, block: &SignedBlock, occupant: Occupant) -> Result<Verdict, StateError> {
        if let Err(e) = block.verify_author() {
            debug!(channel = %block.header().channel_id, "conflicting block with bad signature: {e}");
            return Ok(ExecutionFlag::Disconnect.into());
        }
        let evidence = match occupant {
            Occupant::Held(first) => Evidence::ConflictingBlocks {
                first,
                second: block.clone(),
            },
            Occupant::Folded(fold) => Evidence::SupersededBlock {
                stale: block.clone(),
                superseding: fold.block,
                confirmations: fold.confirmations,
            },
            Occupant::Vacant | Occupant::Same | Occupant::Unknown => {
                return Ok(Verdict::disputed(block.header().participant, None));
            }
        };
        let dispute = self.classifier.classify(evidence)?;
        warn!(
            channel = %block.header().channel_id,
            author = %block.header().participant.short(),
            transaction_cnt = block.header().transaction_cnt,
            proof_type = %dispute.proof_type(),
            "conflicting block"
        );
        Ok(Verdict::disputed(block.header().participant, Some(dispute)))
    }

    async fn accept(&self, block: &SignedBlock, now: Timestamp, origin: Origin) -> Result<Verdict, StateError> {
        let h = block.header();
        if let Some(flag) = self.fork_check(h) {
            debug!(channel = %h.channel_id, fork = h.fork_cnt, %flag, "fork mismatch");
            return Ok(flag.into());
        }

        let too_far_ahead = match origin {
            Origin::Peer => match self.tolerance.evaluate(&h.timestamp, &now) {
                ExecutionFlag::NotEnoughTime => {
                    debug!(channel = %h.channel_id, timestamp = %h.timestamp, %now, "stale block");
                    return Ok(ExecutionFlag::NotEnoughTime.into());
                }
                flag => flag == ExecutionFlag::Dispute,
            },
            Origin::Chain => self.tolerance.is_too_far_in_future(&h.timestamp, &now),
        };
        if too_far_ahead {
            warn!(channel = %h.channel_id, timestamp = %h.timestamp, %now, "block too far in the future");
            if let Err(e) = block.verify_author() {
                debug!(channel = %h.channel_id, "future block with bad signature: {e}");
                return Ok(ExecutionFlag::Disconnect.into());
            }
            let dispute = self.classifier.classify(Evidence::FutureTimestamp {
                block: block.clone(),
                reference_time: now,
            })?;
            return Ok(Verdict::disputed(h.participant, Some(dispute)));
        }

        let digest = block.digest()?;
        match self.occupant(h, &digest) {
            Occupant::Vacant => {}
            Occupant::Same => return Ok(ExecutionFlag::Duplicate.into()),
            other => return self.conflict(block, other),
        }

        if let Err(e) = block.verify_author() {
            debug!(channel = %h.channel_id, "bad author signature: {e}");
            return Ok(ExecutionFlag::Disconnect.into());
        }
        let active = self.resolve_active(h.channel_id).await?;
        if !active.contains(&h.participant) {
            debug!(channel = %h.channel_id, author = %h.participant.short(), "author not an active participant");
            return Ok(Verdict::disconnect(h.participant));
        }

        let last = self.head(&h.participant);
        if last.checked_add(1) != Some(h.transaction_cnt) {
            warn!(
                channel = %h.channel_id,
                author = %h.participant.short(),
                last,
                got = h.transaction_cnt,
                "transaction counter out of sequence"
            );
            return Ok(Verdict::disputed(h.participant, None));
        }

        let prior_state = self.book.lock().channel.encoded_state.clone();
        let next_state = match self.transition.apply(&prior_state, &block.block) {
            Ok(next) => next,
            Err(e) => {
                warn!(channel = %h.channel_id, author = %h.participant.short(), "{e}");
                let dispute = self.classifier.classify(Evidence::InvalidTransition {
                    block: block.clone(),
                    prior_state,
                })?;
                return Ok(Verdict::disputed(h.participant, Some(dispute)));
            }
        };

        {
            let slot = (h.participant, h.transaction_cnt);
            let mut book = self.book.lock();
            book.channel.encoded_state = next_state;
            book.channel.timestamp = h.timestamp;
            book.heads.insert(h.participant, h.transaction_cnt);
            book.digests.insert(slot, digest);
            book.held.insert(slot, block.clone());
        }
        let key = confirmation_key(&digest);
        self.confirmations.try_insert(&key, h.participant, block.signature);
        self.try_fold(block, &key, &active);
        debug!(
            channel = %h.channel_id,
            author = %h.participant.short(),
            transaction_cnt = h.transaction_cnt,
            "block accepted"
        );
        Ok(ExecutionFlag::Success.into())
    }

    /// Fold the author's older blocks away once `block` is confirmed by
    /// every active participant.
    fn try_fold(&self, block: &SignedBlock, key: &str, active: &[ParticipantId]) {
        if !self.confirmations.is_satisfied(key, active) {
            return;
        }
        let confirmations = self.confirmations.signatures_from(key, active).unwrap_or_default();
        let h = block.header();
        let mut book = self.book.lock();
        if let Some(existing) = book.folds.get(&h.participant) {
            if existing.block.header().transaction_cnt >= h.transaction_cnt {
                return;
            }
        }
        let stale: Vec<Slot> = book
            .held
            .range((h.participant, 0)..(h.participant, h.transaction_cnt))
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &stale {
            book.held.remove(slot);
            if let Some(d) = book.digests.get(slot) {
                self.confirmations.remove(&confirmation_key(d));
            }
        }
        book.folds.insert(
            h.participant,
            Fold {
                block: block.clone(),
                confirmations,
            },
        );
        debug!(
            channel = %h.channel_id,
            author = %h.participant.short(),
            transaction_cnt = h.transaction_cnt,
            folded = stale.len(),
            "history folded"
        );
    }
}
