//! # Signature Quorum Map
//!
//! Per-key accumulation of `signer → signature`, where the key names the
//! co-signed artifact (its digest). A signer contributes at most one
//! signature per key; a repeat is a no-op. An entry is satisfied when every
//! currently active participant has signed.
//!
//! Entries can be given a deadline with [`SignatureQuorumMap::schedule_expiry`];
//! they are removed then whether satisfied or not.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chan_core::ParticipantId;
use chan_crypto::ChannelSignature;
use chan_sync::{ScheduledTask, Scheduler};
use parking_lot::Mutex;

use crate::error::QuorumError;

type Entry = Vec<(ParticipantId, ChannelSignature)>;

/// Shared handle; clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct SignatureQuorumMap {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    scheduler: Scheduler,
}

impl SignatureQuorumMap {
    /// An empty map whose expiries run on `scheduler`.
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            entries: Arc::default(),
            scheduler,
        }
    }

    /// Record `signer`'s signature under `key`. Returns whether anything
    /// was inserted.
    pub fn try_insert(&self, key: &str, signer: ParticipantId, signature: ChannelSignature) -> bool {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_owned()).or_default();
        if entry.iter().any(|(s, _)| *s == signer) {
            return false;
        }
        entry.push((signer, signature));
        true
    }

    /// Whether every id in `active` has signed under `key`.
    pub fn is_satisfied(&self, key: &str, active: &[ParticipantId]) -> bool {
        let entries = self.entries.lock();
        let signed = entries.get(key);
        active.iter().all(|p| {
            signed
                .map(|e| e.iter().any(|(s, _)| s == p))
                .unwrap_or(false)
        })
    }

    /// Ids in `active` that have not signed under `key`.
    pub fn missing(&self, key: &str, active: &[ParticipantId]) -> Vec<ParticipantId> {
        let entries = self.entries.lock();
        let signed = entries.get(key);
        active
            .iter()
            .filter(|p| !signed.map(|e| e.iter().any(|(s, _)| s == *p)).unwrap_or(false))
            .copied()
            .collect()
    }

    /// Every signature under `key`, in insertion order.
    pub fn get(&self, key: &str) -> Result<Vec<(ParticipantId, ChannelSignature)>, QuorumError> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| QuorumError::NotFound(key.to_owned()))
    }

    /// Signatures under `key` from members of `active` only, in insertion
    /// order.
    pub fn signatures_from(&self, key: &str, active: &[ParticipantId]) -> Result<Vec<ChannelSignature>, QuorumError> {
        Ok(self
            .get(key)?
            .into_iter()
            .filter(|(s, _)| active.contains(s))
            .map(|(_, sig)| sig)
            .collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Drop `key` and its signatures. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove `key` after `delay`, satisfied or not.
    pub fn schedule_expiry(&self, key: &str, delay: Duration) -> ScheduledTask {
        let entries = Arc::clone(&self.entries);
        let key = key.to_owned();
        self.scheduler.run_after(delay, async move {
            if entries.lock().remove(&key).is_some() {
                tracing::debug!(key = %key, "quorum entry expired");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chan_crypto::{sign_record, Ed25519KeyPair};

    fn signer() -> (ParticipantId, ChannelSignature) {
        let kp = Ed25519KeyPair::generate();
        let sig = sign_record(&"artifact", &kp).unwrap().signature;
        (kp.participant_id(), sig)
    }

    #[test]
    fn repeat_signer_is_a_no_op() {
        let map = SignatureQuorumMap::default();
        let (p, sig) = signer();
        assert!(map.try_insert("k", p, sig));
        assert!(!map.try_insert("k", p, sig));
        assert_eq!(map.get("k").unwrap().len(), 1);
    }

    #[test]
    fn satisfied_only_when_all_active_signed() {
        let map = SignatureQuorumMap::default();
        let (a, sa) = signer();
        let (b, sb) = signer();
        map.try_insert("k", a, sa);
        assert!(!map.is_satisfied("k", &[a, b]));
        assert_eq!(map.missing("k", &[a, b]), vec![b]);
        map.try_insert("k", b, sb);
        assert!(map.is_satisfied("k", &[a, b]));
        assert!(map.missing("k", &[a, b]).is_empty());
    }

    #[test]
    fn slashed_signers_do_not_count() {
        let map = SignatureQuorumMap::default();
        let (a, sa) = signer();
        let (b, sb) = signer();
        map.try_insert("k", a, sa);
        map.try_insert("k", b, sb);
        assert!(map.is_satisfied("k", &[a]));
        assert_eq!(map.signatures_from("k", &[a]).unwrap(), vec![sa]);
    }

    #[test]
    fn get_on_absent_key_is_not_found() {
        let map = SignatureQuorumMap::default();
        assert_eq!(map.get("nope"), Err(QuorumError::NotFound("nope".into())));
        assert!(!map.is_satisfied("nope", &[signer().0]));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_removes_entry_regardless_of_state() {
        let map = SignatureQuorumMap::default();
        let (a, sa) = signer();
        map.try_insert("k", a, sa);
        assert!(map.is_satisfied("k", &[a]));
        let task = map.schedule_expiry("k", Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(map.contains("k"));
        assert!(task.join().await);
        assert!(!map.contains("k"));
        assert!(map.is_empty());
    }
}
