//! The in-memory arbitrator driven through the resolver, dispute
//! submission and calldata posting, the way a node uses it.

use std::sync::Arc;

use chan_arbitration::{
    Arbitrator, ArbitratorEvent, DisputeClassifier, Evidence, InMemoryArbitrator, ParticipantResolver, Proof,
    ProofType,
};
use chan_core::{ChannelId, Clock, EncodedBytes, ManualClock, Timestamp};
use chan_crypto::Ed25519KeyPair;
use chan_messages::{Block, BlockBody, BlockHeader, SignedBlock};
use chan_sync::RetryPolicy;

const CHANNEL: ChannelId = ChannelId::from_u128(42);

fn block(key: &Ed25519KeyPair, transaction_cnt: u64, data: &[u8], at: Timestamp) -> SignedBlock {
    Block {
        header: BlockHeader {
            participant: key.participant_id(),
            transaction_cnt,
            fork_cnt: 0,
            timestamp: at,
            channel_id: CHANNEL,
        },
        body: BlockBody {
            transaction_type: 0,
            encoded_data: EncodedBytes::new(data.to_vec()),
        },
    }
    .sign(key)
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn resolver_rides_out_outages_and_tracks_slashing() {
    let arb = Arc::new(InMemoryArbitrator::default());
    let a = Ed25519KeyPair::generate();
    let b = Ed25519KeyPair::generate();
    let c = Ed25519KeyPair::generate();
    arb.create_channel(CHANNEL, vec![a.participant_id(), b.participant_id()]);
    arb.add_pending(CHANNEL, c.participant_id());

    let resolver = ParticipantResolver::new(arb.clone(), RetryPolicy::fixed(4, 10));
    arb.fail_next(2);
    assert_eq!(
        resolver.resolve(CHANNEL).await.unwrap(),
        vec![a.participant_id(), b.participant_id(), c.participant_id()]
    );

    arb.slash(CHANNEL, b.participant_id());
    assert!(!resolver.is_active(CHANNEL, &b.participant_id()).await.unwrap());
    assert_eq!(
        resolver.resolve(CHANNEL).await.unwrap(),
        vec![a.participant_id(), c.participant_id()]
    );
}

#[tokio::test(start_paused = true)]
async fn resolver_gives_up_on_unknown_channel_at_once() {
    let arb = Arc::new(InMemoryArbitrator::default());
    let resolver = ParticipantResolver::new(arb, RetryPolicy::fixed(5, 1_000));
    let err = resolver.resolve(CHANNEL).await.unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn double_sign_dispute_survives_submission() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_epoch_secs(1_700_000_000).unwrap()));
    let arb = InMemoryArbitrator::new(clock.clone());
    let rogue = Ed25519KeyPair::generate();
    arb.create_channel(CHANNEL, vec![rogue.participant_id()]);

    let first = block(&rogue, 5, b"pay alice", clock.now());
    let second = block(&rogue, 5, b"pay bob", clock.now());
    let dispute = DisputeClassifier::default()
        .classify(Evidence::ConflictingBlocks {
            first: first.clone(),
            second: second.clone(),
        })
        .unwrap();
    arb.submit_dispute(CHANNEL, dispute).await.unwrap();

    let recorded = arb.disputes();
    assert_eq!(recorded.len(), 1);
    let (channel, dispute) = &recorded[0];
    assert_eq!(*channel, CHANNEL);
    assert_eq!(dispute.proof_type(), ProofType::DoubleSign);
    match dispute.decode_proof().unwrap() {
        Proof::DoubleSign { first: f, second: s } => {
            assert_eq!(f.digest().unwrap(), first.digest().unwrap());
            assert_eq!(s.digest().unwrap(), second.digest().unwrap());
        }
        other => panic!("unexpected proof {other:?}"),
    }
}

#[tokio::test]
async fn posted_calldata_is_stamped_with_chain_time() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_epoch_secs(1_700_000_000).unwrap()));
    let arb = InMemoryArbitrator::new(clock.clone());
    let author = Ed25519KeyPair::generate();
    arb.create_channel(CHANNEL, vec![author.participant_id()]);

    let posted = block(&author, 1, b"tx", clock.now());
    clock.advance(30);
    arb.post_block_calldata(CHANNEL, posted.clone(), vec![]).await.unwrap();

    let events = arb.drain_events();
    match events.as_slice() {
        [ArbitratorEvent::BlockCalldataPosted { block, timestamp, .. }] => {
            assert_eq!(block.digest().unwrap(), posted.digest().unwrap());
            assert_eq!(*timestamp, clock.now());
        }
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(arb.posted_blocks().len(), 1);
}
