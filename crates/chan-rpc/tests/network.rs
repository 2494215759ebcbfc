//! Multi-node behavior over the loopback transport and the in-memory
//! arbitrator.

use std::sync::Arc;
use std::time::Duration;

use chan_arbitration::{Arbitrator, DisputeUpdate, InMemoryArbitrator, ProofType};
use chan_core::{ChannelId, Clock, EncodedBytes, ExecutionFlag, ManualClock, ParticipantId, Timestamp};
use chan_crypto::Ed25519KeyPair;
use chan_messages::{Block, BlockBody, BlockHeader, JoinChannel, Message, SignedBlock};
use chan_rpc::{dispatch, ChannelNode, Envelope, LoopbackNetwork, NodeConfig, Routed, RpcContext, Transport};
use tokio::sync::mpsc::UnboundedReceiver;

const T0: i64 = 1_700_000_000;
const CHANNEL: ChannelId = ChannelId::from_u128(0xC4A7);

struct Cluster {
    clock: ManualClock,
    arbitrator: Arc<InMemoryArbitrator>,
    net: LoopbackNetwork,
    nodes: Vec<ChannelNode>,
    inboxes: Vec<Option<UnboundedReceiver<Envelope>>>,
}

impl Cluster {
    /// `members` nodes that are in the channel, plus `outsiders` that are
    /// on the network but not in it.
    fn new(members: u8, outsiders: u8) -> Self {
        let clock = ManualClock::new(Timestamp::from_epoch_secs(T0).unwrap());
        let arbitrator = Arc::new(InMemoryArbitrator::new(Arc::new(clock.clone())));
        let net = LoopbackNetwork::new();
        let keys: Vec<_> = (1..=members + outsiders)
            .map(|i| Ed25519KeyPair::from_seed(&[i; 32]))
            .collect();
        arbitrator.create_channel(
            CHANNEL,
            keys[..members as usize].iter().map(|k| k.participant_id()).collect(),
        );

        let mut nodes = Vec::new();
        let mut inboxes = Vec::new();
        for (i, key) in keys.into_iter().enumerate() {
            let (transport, inbox) = net.join(key.participant_id());
            let ctx = RpcContext::new(
                key,
                NodeConfig::default(),
                Arc::new(clock.clone()),
                arbitrator.clone(),
                Arc::new(transport),
            );
            let node = ChannelNode::new(ctx);
            if i < members as usize {
                node.host(CHANNEL, EncodedBytes::empty());
            }
            nodes.push(node);
            inboxes.push(Some(inbox));
        }
        Self {
            clock,
            arbitrator,
            net,
            nodes,
            inboxes,
        }
    }

    fn serve_all_except(&mut self, skip: &[usize]) {
        for (i, node) in self.nodes.iter().enumerate() {
            if skip.contains(&i) {
                continue;
            }
            if let Some(inbox) = self.inboxes[i].take() {
                node.serve(inbox);
            }
        }
    }

    fn id(&self, i: usize) -> ParticipantId {
        self.nodes[i].id()
    }

    fn head(&self, at: usize, author: usize) -> u64 {
        self.nodes[at]
            .context()
            .manager(&CHANNEL)
            .map(|m| m.head(&self.id(author)))
            .unwrap_or(0)
    }

    async fn pump_events(&self) {
        for event in self.arbitrator.drain_events() {
            for node in &self.nodes {
                node.on_arbitrator_event(&event).await.unwrap();
            }
        }
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

fn body(data: &[u8]) -> BlockBody {
    BlockBody {
        transaction_type: 0,
        encoded_data: EncodedBytes::from(data),
    }
}

fn raw_block(kp: &Ed25519KeyPair, cnt: u64, clock: &ManualClock, data: &[u8]) -> SignedBlock {
    Block {
        header: BlockHeader {
            participant: kp.participant_id(),
            transaction_cnt: cnt,
            fork_cnt: 0,
            timestamp: clock.now(),
            channel_id: CHANNEL,
        },
        body: body(data),
    }
    .sign(kp)
    .unwrap()
}

#[tokio::test]
async fn blocks_replicate_and_fully_confirm() {
    let mut c = Cluster::new(3, 0);
    c.serve_all_except(&[]);

    let mut last = Vec::new();
    for i in 1..=3u8 {
        let (b, flag) = c.nodes[0].propose_block(CHANNEL, body(&[i])).await.unwrap();
        assert_eq!(flag, ExecutionFlag::Success);
        last.push(b);
    }
    let (from_one, _) = c.nodes[1].propose_block(CHANNEL, body(b"one")).await.unwrap();

    eventually("all heads", || (0..3).all(|n| c.head(n, 0) == 3 && c.head(n, 1) == 1)).await;
    let tip = last.pop().unwrap();
    eventually("full confirmation", || {
        c.nodes.iter().all(|n| {
            let m = n.context().manager(&CHANNEL).unwrap();
            m.collected_confirmations(&tip).unwrap().len() == 3
                && m.collected_confirmations(&from_one).unwrap().len() == 3
        })
    })
    .await;
    assert!(c.net.disconnects().is_empty());
    assert!(c.arbitrator.disputes().is_empty());
}

#[tokio::test]
async fn stale_join_is_refused_before_signature_check() {
    let c = Cluster::new(2, 0);
    let ctx = c.nodes[0].context();
    let impostor = Ed25519KeyPair::from_seed(&[77; 32]);
    let claimed = Ed25519KeyPair::from_seed(&[78; 32]).participant_id();

    let stale = JoinChannel {
        participant: claimed,
        channel_id: CHANNEL,
        deadline: c.clock.now().offset_secs(-1),
    }
    .sign(&impostor)
    .unwrap();
    let routed = dispatch(
        ctx,
        impostor.participant_id(),
        Message::JoinChannelRequest {
            join: stale,
            confirmation: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::NotEnoughTime));
    assert!(c.net.disconnects().is_empty());

    let fresh_forgery = JoinChannel {
        participant: claimed,
        channel_id: CHANNEL,
        deadline: c.clock.now().offset_secs(30),
    }
    .sign(&impostor)
    .unwrap();
    let routed = dispatch(
        ctx,
        impostor.participant_id(),
        Message::JoinChannelRequest {
            join: fresh_forgery,
            confirmation: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::Disconnect));
}

#[tokio::test]
async fn join_handshake_opens_channel_for_joiner() {
    let mut c = Cluster::new(2, 1);
    c.serve_all_except(&[]);
    let joiner = c.id(2);

    let join = c.nodes[2].request_join(CHANNEL).await.unwrap();
    assert_eq!(join.join.participant, joiner);

    eventually("join submitted", || c.arbitrator.opened_channels().len() == 1).await;
    let pending = c.arbitrator.pending_participants(CHANNEL).await.unwrap();
    assert_eq!(pending, vec![joiner]);
    eventually("joiner's quorum entry cleared", || c.nodes[2].context().joins().is_empty()).await;

    // Once pending, the joiner is an active participant and can author.
    c.nodes[2].propose_block(CHANNEL, body(b"hello")).await.unwrap();
    eventually("joiner's block replicated", || c.head(0, 2) == 1 && c.head(1, 2) == 1).await;
}

#[tokio::test]
async fn double_sign_is_disputed_and_author_severed() {
    // Node 0 is driven by hand as the misbehaving author.
    let mut c = Cluster::new(3, 0);
    c.serve_all_except(&[0]);
    let rogue_key = Ed25519KeyPair::from_seed(&[1; 32]);
    let (rogue, _rogue_inbox) = c.net.join(rogue_key.participant_id());

    for cnt in 1..=5 {
        let b = raw_block(&rogue_key, cnt, &c.clock, &[cnt as u8]);
        rogue.broadcast(&Message::SignedBlock { block: b }).await.unwrap();
    }
    let rival = raw_block(&rogue_key, 5, &c.clock, b"rival");
    rogue.broadcast(&Message::SignedBlock { block: rival }).await.unwrap();

    eventually("disputes", || c.arbitrator.disputes().len() == 2).await;
    assert!(c
        .arbitrator
        .disputes()
        .iter()
        .all(|(ch, d)| *ch == CHANNEL && d.proof_type() == ProofType::DoubleSign));
    assert!(!c.net.is_connected(c.id(1), c.id(0)));
    assert!(!c.net.is_connected(c.id(2), c.id(0)));
    assert_eq!(c.head(1, 0), 5);
}

#[tokio::test]
async fn rival_blocks_sent_to_different_nodes_sever_only_the_author() {
    let mut c = Cluster::new(3, 0);
    let rogue_key = Ed25519KeyPair::from_seed(&[1; 32]);
    let rogue = rogue_key.participant_id();
    let a = raw_block(&rogue_key, 1, &c.clock, b"to node 1");
    let b = raw_block(&rogue_key, 1, &c.clock, b"to node 2");

    // Each honest node accepts its copy and relays it before reading its inbox.
    let routed = dispatch(c.nodes[1].context(), rogue, Message::SignedBlock { block: a })
        .await
        .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::Success));
    let routed = dispatch(c.nodes[2].context(), rogue, Message::SignedBlock { block: b })
        .await
        .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::Success));

    c.serve_all_except(&[0]);
    eventually("rogue severed by both", || {
        !c.net.is_connected(c.id(1), rogue) && !c.net.is_connected(c.id(2), rogue)
    })
    .await;
    eventually("both disputes", || c.arbitrator.disputes().len() >= 2).await;

    assert!(c.net.is_connected(c.id(1), c.id(2)));
    assert!(c
        .net
        .disconnects()
        .iter()
        .all(|(_, severed)| *severed == rogue));
    assert!(c
        .arbitrator
        .disputes()
        .iter()
        .all(|(_, d)| d.proof_type() == ProofType::DoubleSign));
}

#[tokio::test]
async fn member_that_missed_the_join_still_co_signs() {
    let mut c = Cluster::new(2, 1);
    c.serve_all_except(&[]);
    let joiner_key = Ed25519KeyPair::from_seed(&[3; 32]);
    let joiner = joiner_key.participant_id();
    let join = JoinChannel {
        participant: joiner,
        channel_id: CHANNEL,
        deadline: c.clock.now().offset_secs(60),
    }
    .sign(&joiner_key)
    .unwrap();

    // Only node 0 hears the original request; node 1 learns of the join
    // through node 0's forwarded co-signature.
    let routed = dispatch(
        c.nodes[0].context(),
        joiner,
        Message::JoinChannelRequest {
            join,
            confirmation: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::Success));

    eventually("join submitted", || c.arbitrator.opened_channels().len() == 1).await;
    assert_eq!(c.arbitrator.pending_participants(CHANNEL).await.unwrap(), vec![joiner]);
    assert!(c.net.disconnects().is_empty());
}

#[tokio::test]
async fn slashed_co_signer_is_dropped_without_severing_the_relay() {
    let c = Cluster::new(3, 1);
    let joiner_key = Ed25519KeyPair::from_seed(&[4; 32]);
    let join = JoinChannel {
        participant: joiner_key.participant_id(),
        channel_id: CHANNEL,
        deadline: c.clock.now().offset_secs(60),
    }
    .sign(&joiner_key)
    .unwrap();
    let slashed = Ed25519KeyPair::from_seed(&[3; 32]);
    let co_signature = join.co_sign(&slashed).unwrap();
    c.arbitrator.slash(CHANNEL, slashed.participant_id());

    let routed = dispatch(
        c.nodes[0].context(),
        c.id(1),
        Message::JoinChannelRequest {
            join,
            confirmation: Some(co_signature),
        },
    )
    .await
    .unwrap();
    assert_eq!(routed, Routed::Flag(ExecutionFlag::NotReady));
    assert!(c.net.disconnects().is_empty());
}

#[tokio::test]
async fn leader_discovery_returns_active_set() {
    let mut c = Cluster::new(2, 1);
    c.serve_all_except(&[]);
    let participants = c.nodes[2].request_leader(c.id(0), CHANNEL).await.unwrap();
    assert_eq!(participants, vec![c.id(0), c.id(1)]);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_block_is_escalated_on_chain() {
    let mut c = Cluster::new(2, 0);
    // Node 1 never reads its inbox, so it never confirms.
    c.serve_all_except(&[1]);
    let (block, _) = c.nodes[0].propose_block(CHANNEL, body(b"x")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    let posted = c.arbitrator.posted_blocks();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, block);
    assert_eq!(posted[0].2.len(), 1);

    // The posted calldata reaches node 1 through the event stream.
    assert_eq!(c.head(1, 0), 0);
    c.pump_events().await;
    assert_eq!(c.head(1, 0), 1);
}

#[tokio::test(start_paused = true)]
async fn confirmed_block_is_not_escalated() {
    let mut c = Cluster::new(2, 0);
    c.serve_all_except(&[]);
    c.nodes[0].propose_block(CHANNEL, body(b"x")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(c.arbitrator.posted_blocks().is_empty());
}

#[tokio::test]
async fn settlement_and_dispute_events_reach_every_node() {
    let mut c = Cluster::new(2, 0);
    c.serve_all_except(&[]);
    for i in 1..=2u8 {
        c.nodes[0].propose_block(CHANNEL, body(&[i])).await.unwrap();
    }
    eventually("replicated", || c.head(1, 0) == 2).await;

    // A dispute claims node 0 stopped at 1; both nodes hold block 2.
    c.arbitrator.publish_dispute_update(
        CHANNEL,
        DisputeUpdate::Opened {
            fork_cnt: 0,
            claimed_heads: vec![(c.id(0), 1)],
        },
    );
    c.pump_events().await;
    let disputes = c.arbitrator.disputes();
    assert_eq!(disputes.len(), 2);
    assert!(disputes.iter().all(|(_, d)| d.proof_type() == ProofType::NewerState));

    c.arbitrator
        .settle(CHANNEL, EncodedBytes::from(&b"settled"[..]), 1);
    c.pump_events().await;
    for node in &c.nodes {
        let snap = node.context().manager(&CHANNEL).unwrap().snapshot();
        assert_eq!(snap.fork_cnt, 1);
        assert_eq!(snap.encoded_state, EncodedBytes::from(&b"settled"[..]));
    }

    let old_fork = raw_block(&Ed25519KeyPair::from_seed(&[1; 32]), 3, &c.clock, b"late");
    let flag = c.nodes[1]
        .context()
        .manager(&CHANNEL)
        .unwrap()
        .on_signed_block(&old_fork)
        .await
        .unwrap()
        .flag;
    assert_eq!(flag, ExecutionFlag::PastFork);
}
