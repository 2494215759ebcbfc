//! Block acceptance driven end to end against an in-memory arbitrator.

use std::sync::Arc;

use chan_arbitration::{InMemoryArbitrator, ParticipantResolver, ProofType};
use chan_core::{ChannelId, Clock, EncodedBytes, ExecutionFlag, ManualClock, Timestamp};
use chan_crypto::Ed25519KeyPair;
use chan_messages::{Block, BlockBody, BlockHeader, SignedBlock};
use chan_state::{Channel, StateManager};
use chan_sync::RetryPolicy;

const T0: i64 = 1_700_000_000;

fn setup(seeds: &[u8]) -> (ManualClock, Arc<InMemoryArbitrator>, Arc<StateManager>, Vec<Ed25519KeyPair>) {
    let clock = ManualClock::new(Timestamp::from_epoch_secs(T0).unwrap());
    let arbitrator = Arc::new(InMemoryArbitrator::new(Arc::new(clock.clone())));
    let keys: Vec<_> = seeds.iter().map(|s| Ed25519KeyPair::from_seed(&[*s; 32])).collect();
    let id = ChannelId::from_u128(11);
    arbitrator.create_channel(id, keys.iter().map(|k| k.participant_id()).collect());
    let resolver = ParticipantResolver::new(arbitrator.clone(), RetryPolicy::fixed(1, 0));
    let manager = StateManager::new(
        Channel::new(id, EncodedBytes::empty(), clock.now()),
        resolver,
        Arc::new(clock.clone()),
    );
    (clock, arbitrator, Arc::new(manager), keys)
}

fn block(kp: &Ed25519KeyPair, cnt: u64, fork: u64, clock: &ManualClock, data: &[u8]) -> SignedBlock {
    Block {
        header: BlockHeader {
            participant: kp.participant_id(),
            transaction_cnt: cnt,
            fork_cnt: fork,
            timestamp: clock.now(),
            channel_id: ChannelId::from_u128(11),
        },
        body: BlockBody {
            transaction_type: 0,
            encoded_data: EncodedBytes::from(data),
        },
    }
    .sign(kp)
    .unwrap()
}

#[tokio::test]
async fn two_authors_interleave_independent_counters() {
    let (clock, _arb, manager, keys) = setup(&[1, 2]);
    let (a, b) = (&keys[0], &keys[1]);
    let mut from_a = Vec::new();
    for cnt in 1..=3 {
        clock.advance(1);
        let next_a = block(a, cnt, 0, &clock, format!("a{cnt}").as_bytes());
        assert_eq!(manager.on_signed_block(&next_a).await.unwrap().flag, ExecutionFlag::Success);
        let next_b = block(b, cnt, 0, &clock, format!("b{cnt}").as_bytes());
        assert_eq!(manager.on_signed_block(&next_b).await.unwrap().flag, ExecutionFlag::Success);
        from_a.push(next_a);
    }
    assert_eq!(manager.head(&a.participant_id()), 3);
    assert_eq!(manager.head(&b.participant_id()), 3);
    assert_eq!(manager.snapshot().encoded_state, EncodedBytes::from(&b"b3"[..]));
    assert_eq!(manager.snapshot().timestamp, clock.now());

    // Re-submitting an older block once later ones exist is a duplicate.
    assert_eq!(manager.on_signed_block(&from_a[1]).await.unwrap().flag, ExecutionFlag::Duplicate);
    assert_eq!(manager.head(&a.participant_id()), 3);
    assert_eq!(manager.snapshot().encoded_state, EncodedBytes::from(&b"b3"[..]));
}

#[tokio::test]
async fn block_for_next_fork_waits() {
    let (clock, _arb, manager, keys) = setup(&[1, 2]);
    let early = block(&keys[0], 1, 1, &clock, b"x");
    assert_eq!(manager.on_signed_block(&early).await.unwrap().flag, ExecutionFlag::NotReady);
    assert_eq!(manager.head(&keys[0].participant_id()), 0);
}

#[tokio::test]
async fn double_sign_at_five() {
    let (clock, _arb, manager, keys) = setup(&[1, 2]);
    for cnt in 1..=5 {
        manager
            .on_signed_block(&block(&keys[0], cnt, 0, &clock, &[cnt as u8]))
            .await
            .unwrap();
    }
    let rival = block(&keys[0], 5, 0, &clock, b"rival");
    let verdict = manager.on_signed_block(&rival).await.unwrap();
    assert_eq!(verdict.flag, ExecutionFlag::Dispute);
    let dispute = verdict.dispute.unwrap();
    assert_eq!(dispute.proof_type(), ProofType::DoubleSign);
    assert!(dispute.decode_proof().is_ok());
}

#[tokio::test]
async fn settlement_promotes_pending_joiner() {
    let (clock, arb, manager, keys) = setup(&[1, 2]);
    let joiner = Ed25519KeyPair::from_seed(&[3; 32]);
    let id = manager.channel_id();
    let before = block(&joiner, 1, 0, &clock, b"j");
    assert_eq!(manager.on_signed_block(&before).await.unwrap().flag, ExecutionFlag::Disconnect);

    arb.add_pending(id, joiner.participant_id());
    assert!(manager.on_signed_block(&before).await.unwrap().is_success());
    assert_eq!(manager.snapshot().participants.len(), 3);

    // A block from keys[0] now needs three confirmations.
    let b = block(&keys[0], 1, 0, &clock, b"k");
    manager.on_signed_block(&b).await.unwrap();
    assert_eq!(manager.missing_confirmations(&b).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_apply_each_block_once() {
    let (clock, _arb, manager, keys) = setup(&[1, 2]);
    let blocks: Vec<_> = (1..=8).map(|cnt| block(&keys[0], cnt, 0, &clock, &[cnt as u8])).collect();

    // Each block is delivered twice at once, in counter order: exactly one
    // copy is applied and the other is a duplicate.
    for b in &blocks {
        let pair: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let b = b.clone();
                tokio::spawn(async move { manager.on_signed_block(&b).await.unwrap().flag })
            })
            .collect();
        let mut flags = Vec::new();
        for h in pair {
            flags.push(h.await.unwrap());
        }
        let successes = flags.iter().filter(|f| **f == ExecutionFlag::Success).count();
        let duplicates = flags.iter().filter(|f| **f == ExecutionFlag::Duplicate).count();
        assert_eq!((successes, duplicates), (1, 1), "block {}: {flags:?}", b.header().transaction_cnt);
    }
    assert_eq!(manager.head(&keys[0].participant_id()), 8);
    assert_eq!(manager.snapshot().encoded_state, EncodedBytes::from(&[8u8][..]));
}
