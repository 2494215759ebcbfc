//! # Keygen Subcommand
//!
//! Writes a participant key file:
//!
//! ```json
//! { "participant_id": "<64 hex>", "seed_hex": "<64 hex>" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chan_core::ParticipantId;
use chan_crypto::Ed25519KeyPair;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::write_json;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Derive the key from this 32-byte hex seed instead of the OS RNG.
    #[arg(long)]
    pub seed_hex: Option<String>,

    /// Write the key file here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    pub participant_id: ParticipantId,
    pub seed_hex: String,
}

impl KeyFile {
    pub fn from_key(key: &Ed25519KeyPair) -> Self {
        Self {
            participant_id: key.participant_id(),
            seed_hex: key.seed_hex(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing key file {}", path.display()))
    }

    /// The key pair, checked against the recorded participant id.
    pub fn key_pair(&self) -> Result<Ed25519KeyPair> {
        let key = Ed25519KeyPair::from_seed_hex(&self.seed_hex).context("decoding seed")?;
        anyhow::ensure!(
            key.participant_id() == self.participant_id,
            "key file participant {} does not match its seed",
            self.participant_id.short()
        );
        Ok(key)
    }
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let key = match &args.seed_hex {
        Some(seed) => Ed25519KeyPair::from_seed_hex(seed).context("decoding --seed-hex")?,
        None => Ed25519KeyPair::generate(),
    };
    write_json(&KeyFile::from_key(&key), args.out.as_deref())?;
    tracing::info!(participant = %key.participant_id().short(), "key generated");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_round_trips_and_checks_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        let args = KeygenArgs {
            seed_hex: Some("07".repeat(32)),
            out: Some(path.clone()),
        };
        assert_eq!(run_keygen(&args).unwrap(), 0);

        let file = KeyFile::load(&path).unwrap();
        let key = file.key_pair().unwrap();
        assert_eq!(key.participant_id(), Ed25519KeyPair::from_seed(&[7; 32]).participant_id());

        let tampered = KeyFile {
            participant_id: Ed25519KeyPair::from_seed(&[8; 32]).participant_id(),
            ..file
        };
        assert!(tampered.key_pair().is_err());
    }
}
