//! # Simulate Subcommand
//!
//! Runs `--participants` nodes in-process over a loopback network against
//! an in-memory arbitrator. Every node authors `--blocks` blocks in round
//! robin; the run succeeds once every node holds every block. With
//! `--double-sign`, participant 0 then signs a rival of its last block and
//! the run additionally waits for the resulting disputes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chan_arbitration::InMemoryArbitrator;
use chan_core::{ChannelId, EncodedBytes, SystemClock, Timestamp};
use chan_crypto::Ed25519KeyPair;
use chan_messages::{Block, BlockBody, BlockHeader, Message};
use chan_rpc::{ChannelNode, LoopbackNetwork, NodeConfig, RpcContext, Transport};
use clap::Args;
use serde::Serialize;

use crate::write_json;

const MAX_PARTICIPANTS: u8 = 32;
const POLL: Duration = Duration::from_millis(10);

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(long, default_value_t = 3)]
    pub participants: u8,

    /// Blocks authored by each participant.
    #[arg(long, default_value_t = 5)]
    pub blocks: u64,

    /// Node configuration (YAML) applied to every participant.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Have participant 0 double-sign after the run.
    #[arg(long)]
    pub double_sign: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub channel_id: ChannelId,
    pub converged: bool,
    /// Per node: author short id → head.
    pub heads: BTreeMap<String, BTreeMap<String, u64>>,
    pub disputes: Vec<String>,
    pub disconnects: usize,
}

pub fn run_simulate(args: &SimulateArgs) -> Result<u8> {
    anyhow::ensure!(
        (1..=MAX_PARTICIPANTS).contains(&args.participants),
        "--participants must be between 1 and {MAX_PARTICIPANTS}"
    );
    let config = match &args.config {
        Some(path) => NodeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let report = runtime.block_on(simulate(args, config))?;
    let ok = report.converged && (!args.double_sign || !report.disputes.is_empty());
    write_json(&report, None)?;
    Ok(if ok { 0 } else { 1 })
}

pub async fn simulate(args: &SimulateArgs, config: NodeConfig) -> Result<Report> {
    let channel_id = ChannelId::new();
    let arbitrator = Arc::new(InMemoryArbitrator::new(Arc::new(SystemClock)));
    let net = LoopbackNetwork::new();
    let keys: Vec<_> = (1..=args.participants)
        .map(|i| Ed25519KeyPair::from_seed(&[i; 32]))
        .collect();
    let ids: Vec<_> = keys.iter().map(|k| k.participant_id()).collect();
    arbitrator.create_channel(channel_id, ids.clone());

    let mut nodes = Vec::new();
    for key in keys {
        let (transport, inbox) = net.join(key.participant_id());
        let ctx = RpcContext::new(
            key,
            config.clone(),
            Arc::new(SystemClock),
            arbitrator.clone(),
            Arc::new(transport),
        );
        let node = ChannelNode::new(ctx);
        node.host(channel_id, EncodedBytes::empty());
        node.serve(inbox);
        nodes.push(node);
    }
    tracing::info!(channel = %channel_id, participants = nodes.len(), "simulation started");

    for round in 1..=args.blocks {
        for node in &nodes {
            let body = BlockBody {
                transaction_type: 0,
                encoded_data: EncodedBytes::new(format!("{}:{round}", node.id().short()).into_bytes()),
            };
            node.propose_block(channel_id, body).await?;
        }
    }

    let heads_of = |nodes: &[ChannelNode]| -> BTreeMap<String, BTreeMap<String, u64>> {
        nodes
            .iter()
            .map(|n| {
                let heads = n
                    .context()
                    .manager(&channel_id)
                    .map(|m| ids.iter().map(|p| (p.short(), m.head(p))).collect())
                    .unwrap_or_default();
                (n.id().short(), heads)
            })
            .collect()
    };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.timeout_secs);
    let converged = loop {
        let done = heads_of(&nodes)
            .values()
            .all(|heads| heads.values().all(|h| *h == args.blocks));
        if done || tokio::time::Instant::now() >= deadline {
            break done;
        }
        tokio::time::sleep(POLL).await;
    };

    if args.double_sign {
        if let Some(rogue) = nodes.first() {
            let manager = rogue
                .context()
                .manager(&channel_id)
                .context("rogue node lost its channel")?;
            let rival = Block {
                header: BlockHeader {
                    participant: rogue.id(),
                    transaction_cnt: manager.head(&rogue.id()),
                    fork_cnt: manager.fork_cnt(),
                    timestamp: Timestamp::now(),
                    channel_id,
                },
                body: BlockBody {
                    transaction_type: 0,
                    encoded_data: EncodedBytes::new(b"rival".to_vec()),
                },
            }
            .sign(rogue.context().key())?;
            rogue
                .context()
                .transport()
                .broadcast(&Message::SignedBlock { block: rival })
                .await?;
            while arbitrator.disputes().is_empty() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(POLL).await;
            }
        }
    }

    Ok(Report {
        channel_id,
        converged,
        heads: heads_of(&nodes),
        disputes: arbitrator
            .disputes()
            .iter()
            .map(|(_, d)| d.proof_type().to_string())
            .collect(),
        disconnects: net.disconnects().len(),
    })
}
