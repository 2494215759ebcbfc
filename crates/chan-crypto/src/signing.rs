//! # Record Signing and Signer Recovery
//!
//! `sign_record` canonicalizes a record, hashes it, and signs the digest.
//! `recover_signer` recomputes the digest from the record alone and returns
//! the identity whose key produced the signature. Ed25519 cannot recover a
//! key from a signature, so [`ChannelSignature`] carries the signer's public
//! key; recovery succeeds only when that key verifies the digest.
//!
//! Round-trip law: `recover_signer(r, &sign_record(r, k)?.signature) ==
//! k.participant_id()` for every serializable record without floats.

use chan_core::{sha256_digest, CanonicalBytes, ContentDigest, CryptoError, EncodedBytes, ParticipantId};
use serde::{Deserialize, Serialize};

use crate::ed25519::{verify_digest, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// A signature over a canonical record, together with the signing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSignature {
    /// The identity that claims to have signed.
    pub signer: ParticipantId,
    /// Ed25519 signature over the record digest.
    pub signature: Ed25519Signature,
}

impl ChannelSignature {
    /// Verify this signature over `record` and require that it was made by
    /// `expected`.
    pub fn verify_as<T: Serialize>(
        &self,
        record: &T,
        expected: &ParticipantId,
    ) -> Result<(), CryptoError> {
        let signer = recover_signer(record, self)?;
        if &signer != expected {
            return Err(CryptoError::VerificationFailed(format!(
                "signed by {}, expected {}",
                signer.short(),
                expected.short()
            )));
        }
        Ok(())
    }
}

/// Output of [`sign_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRecord {
    /// Canonical encoding of the record that was signed.
    pub encoded: EncodedBytes,
    /// SHA-256 of `encoded`.
    pub digest: ContentDigest,
    /// The signature and signer identity.
    pub signature: ChannelSignature,
}

/// SHA-256 digest of the canonical encoding of `record`.
pub fn record_digest<T: Serialize>(record: &T) -> Result<ContentDigest, CryptoError> {
    let canonical = CanonicalBytes::new(record)?;
    Ok(sha256_digest(&canonical))
}

/// Canonically encode `record`, hash it, and sign the hash with `key`.
pub fn sign_record<T: Serialize>(record: &T, key: &Ed25519KeyPair) -> Result<SignedRecord, CryptoError> {
    let canonical = CanonicalBytes::new(record)?;
    let digest = sha256_digest(&canonical);
    let signature = ChannelSignature {
        signer: key.participant_id(),
        signature: key.sign_digest(&digest),
    };
    Ok(SignedRecord {
        encoded: EncodedBytes::new(canonical.into_vec()),
        digest,
        signature,
    })
}

/// Recompute the digest of `record` and return the identity that signed it.
///
/// Pure: no key material is consulted beyond what the signature carries.
pub fn recover_signer<T: Serialize>(
    record: &T,
    signature: &ChannelSignature,
) -> Result<ParticipantId, CryptoError> {
    let digest = record_digest(record)?;
    let public_key = Ed25519PublicKey::from(signature.signer);
    verify_digest(&digest, &signature.signature, &public_key)?;
    Ok(signature.signer)
}
