//! Join-channel commitments.
//!
//! A `JoinChannel` expires at its own `deadline`. Every active participant
//! co-signs the same record; the joiner submits the collected signatures to
//! the arbitrator to open the channel.

use chan_core::{ChannelId, ContentDigest, CryptoError, ParticipantId, Timestamp};
use chan_crypto::{record_digest, recover_signer, sign_record, ChannelSignature, Ed25519KeyPair};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinChannel {
    pub participant: ParticipantId,
    pub channel_id: ChannelId,
    /// Last instant at which the commitment may be accepted.
    pub deadline: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedJoinChannel {
    pub join: JoinChannel,
    /// The joiner's own signature.
    pub signature: ChannelSignature,
}

impl JoinChannel {
    pub fn sign(self, key: &Ed25519KeyPair) -> Result<SignedJoinChannel, CryptoError> {
        let signed = sign_record(&self, key)?;
        Ok(SignedJoinChannel {
            join: self,
            signature: signed.signature,
        })
    }

    /// Whether `now` is past the deadline.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        now > &self.deadline
    }
}

impl SignedJoinChannel {
    pub fn digest(&self) -> Result<ContentDigest, CryptoError> {
        record_digest(&self.join)
    }

    /// Key under which co-signatures of this join are collected.
    pub fn quorum_key(&self) -> Result<String, CryptoError> {
        Ok(format!("join:{}", self.digest()?.to_hex()))
    }

    pub fn recover_signer(&self) -> Result<ParticipantId, CryptoError> {
        recover_signer(&self.join, &self.signature)
    }

    /// A co-signature from `key` over the same join record.
    pub fn co_sign(&self, key: &Ed25519KeyPair) -> Result<ChannelSignature, CryptoError> {
        Ok(sign_record(&self.join, key)?.signature)
    }

    pub fn recover_co_signer(&self, signature: &ChannelSignature) -> Result<ParticipantId, CryptoError> {
        recover_signer(&self.join, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(kp: &Ed25519KeyPair, deadline: i64) -> JoinChannel {
        JoinChannel {
            participant: kp.participant_id(),
            channel_id: ChannelId::default(),
            deadline: Timestamp::from_epoch_secs(deadline).unwrap(),
        }
    }

    #[test]
    fn deadline_is_inclusive() {
        let kp = Ed25519KeyPair::generate();
        let j = join(&kp, 1_000);
        assert!(!j.is_expired(&Timestamp::from_epoch_secs(1_000).unwrap()));
        assert!(j.is_expired(&Timestamp::from_epoch_secs(1_001).unwrap()));
    }

    #[test]
    fn co_signatures_share_the_quorum_key() {
        let joiner = Ed25519KeyPair::generate();
        let peer = Ed25519KeyPair::generate();
        let sj = join(&joiner, 2_000).sign(&joiner).unwrap();
        assert_eq!(sj.recover_signer().unwrap(), joiner.participant_id());

        let co = sj.co_sign(&peer).unwrap();
        assert_eq!(sj.recover_co_signer(&co).unwrap(), peer.participant_id());
        assert!(sj.quorum_key().unwrap().starts_with("join:"));
        assert_eq!(sj.quorum_key().unwrap().len(), "join:".len() + 64);
    }
}
