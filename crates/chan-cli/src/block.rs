//! # Block Subcommands
//!
//! `sign-block` authors a block with a key file; `verify-block` checks the
//! author signature of a signed block read from a file or stdin.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chan_core::{ChannelId, EncodedBytes, Timestamp};
use chan_messages::{Block, BlockBody, BlockHeader, SignedBlock};
use clap::Args;
use serde::Serialize;

use crate::keygen::KeyFile;
use crate::write_json;

#[derive(Args, Debug)]
pub struct SignBlockArgs {
    /// Key file produced by `chan keygen`.
    #[arg(long)]
    pub key: PathBuf,

    /// Channel id (UUID).
    #[arg(long)]
    pub channel_id: String,

    #[arg(long)]
    pub transaction_cnt: u64,

    #[arg(long, default_value_t = 0)]
    pub fork_cnt: u64,

    #[arg(long, default_value_t = 0)]
    pub transaction_type: u32,

    /// Block payload as hex.
    #[arg(long, default_value = "")]
    pub data_hex: String,

    /// RFC 3339 UTC timestamp. Defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,

    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyBlockArgs {
    /// Signed block JSON. `-` reads stdin.
    #[arg(default_value = "-")]
    pub input: String,
}

#[derive(Debug, Serialize)]
struct Verification {
    valid: bool,
    digest: String,
    author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_sign_block(args: &SignBlockArgs) -> Result<u8> {
    let key = KeyFile::load(&args.key)?.key_pair()?;
    let timestamp = match &args.timestamp {
        Some(ts) => Timestamp::parse(ts).context("parsing --timestamp")?,
        None => Timestamp::now(),
    };
    let encoded_data = EncodedBytes::from_hex(&args.data_hex)
        .map_err(|e| anyhow::anyhow!("--data-hex: {e}"))?;
    let block = Block {
        header: BlockHeader {
            participant: key.participant_id(),
            transaction_cnt: args.transaction_cnt,
            fork_cnt: args.fork_cnt,
            timestamp,
            channel_id: ChannelId::parse(&args.channel_id).context("parsing --channel-id")?,
        },
        body: BlockBody {
            transaction_type: args.transaction_type,
            encoded_data,
        },
    }
    .sign(&key)
    .context("signing block")?;
    write_json(&block, args.out.as_deref())?;
    Ok(0)
}

pub fn run_verify_block(args: &VerifyBlockArgs) -> Result<u8> {
    let raw = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input))?
    };
    let block: SignedBlock = serde_json::from_str(&raw).context("parsing signed block")?;
    let (valid, code) = verify(&block)?;
    write_json(&valid, None)?;
    Ok(code)
}

fn verify(block: &SignedBlock) -> Result<(Verification, u8)> {
    let digest = block.digest().context("hashing block")?;
    let result = block.verify_author();
    let verification = Verification {
        valid: result.is_ok(),
        digest: digest.to_hex(),
        author: block.header().participant.to_hex(),
        error: result.as_ref().err().map(|e| e.to_string()),
    };
    let code = if result.is_ok() { 0 } else { 1 };
    Ok((verification, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::{run_keygen, KeygenArgs};

    #[test]
    fn signed_block_verifies_and_tampering_is_caught() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.json");
        run_keygen(&KeygenArgs {
            seed_hex: Some("11".repeat(32)),
            out: Some(key.clone()),
        })
        .unwrap();

        let out = dir.path().join("block.json");
        let args = SignBlockArgs {
            key,
            channel_id: "00000000-0000-0000-0000-000000000001".into(),
            transaction_cnt: 1,
            fork_cnt: 0,
            transaction_type: 2,
            data_hex: "cafe".into(),
            timestamp: Some("2026-01-01T00:00:00Z".into()),
            out: Some(out.clone()),
        };
        assert_eq!(run_sign_block(&args).unwrap(), 0);

        let mut block: SignedBlock = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let (v, code) = verify(&block).unwrap();
        assert!(v.valid);
        assert_eq!(code, 0);

        block.block.header.transaction_cnt = 2;
        let (v, code) = verify(&block).unwrap();
        assert!(!v.valid);
        assert!(v.error.is_some());
        assert_eq!(code, 1);
    }
}
