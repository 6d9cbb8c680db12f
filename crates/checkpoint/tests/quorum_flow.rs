//! End-to-end checkpoint flow over the in-memory gossip hub
//!
//! Four validators (threshold 3) aggregate signatures for the same checkpoint
//! range; the designated proposer submits to the settlement layer exactly
//! once, and messages from outside the committee never touch pool state.

use async_trait::async_trait;
use l2_checkpoint::{
    compute_root, Ack, AckMessage, Artifact, Checkpoint, CheckpointManager, CheckpointMessage,
    CheckpointTransport, Ed25519Signer, GossipMessage, InMemoryHub, MessageSignature,
    SettlementClient, Signer, ValidatorSet,
};
use l2_chain::{Block, BlockReader, BlockStore, Hash, Header};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct RecordingSettlement {
    last_committed: AtomicU64,
    submissions: AtomicUsize,
}

impl RecordingSettlement {
    fn new(last_committed: u64) -> Arc<Self> {
        Arc::new(Self {
            last_committed: AtomicU64::new(last_committed),
            submissions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SettlementClient for RecordingSettlement {
    async fn last_committed_height(&self) -> anyhow::Result<u64> {
        Ok(self.last_committed.load(Ordering::SeqCst))
    }

    async fn submit_checkpoint(
        &self,
        _checkpoint: &Checkpoint,
        signatures: Vec<MessageSignature>,
    ) -> anyhow::Result<()> {
        assert!(!signatures.is_empty());
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared chain all nodes read, so every node derives the identical checkpoint
fn shared_chain(height: u64) -> Arc<BlockStore> {
    let store = Arc::new(BlockStore::new());
    for n in 1..=height {
        store.insert_block(Block::new(
            Header {
                number: n,
                parent_hash: Hash::ZERO,
                timestamp: n * 7,
            },
            Vec::new(),
        ));
    }
    store
}

struct Node {
    manager: Arc<CheckpointManager>,
    settlement: Arc<RecordingSettlement>,
    signer: Arc<Ed25519Signer>,
}

/// Build a committee of `n` started nodes wired through one hub
fn build_committee(n: usize, hub: &InMemoryHub, chain: Arc<BlockStore>) -> Vec<Node> {
    let signers: Vec<Arc<Ed25519Signer>> = (0..n)
        .map(|i| Arc::new(Ed25519Signer::from_seed([i as u8 + 1; 32])))
        .collect();
    let validator_set =
        ValidatorSet::new(signers.iter().map(|s| s.local_address()).collect());

    signers
        .into_iter()
        .map(|signer| {
            let settlement = RecordingSettlement::new(100);
            let manager = Arc::new(CheckpointManager::new(
                chain.clone(),
                settlement.clone(),
                signer.clone(),
                hub.join(),
                validator_set.clone(),
            ));
            manager.start().unwrap();
            Node {
                manager,
                settlement,
                signer,
            }
        })
        .collect()
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test(flavor = "multi_thread")]
async fn checkpoint_reaches_quorum_and_submits_exactly_once() {
    let hub = InMemoryHub::new();
    let chain = shared_chain(200);
    let nodes = build_committee(4, &hub, chain.clone());

    let threshold = nodes[0].manager.validator_set().threshold();
    assert_eq!(threshold, 3);

    // Range [101, 150] at epoch size 50 puts the epoch at 3, so the proposer
    // is the fourth committee member
    let epoch_size = 50;
    let proposer_address = nodes[0].manager.validator_set().proposer(3);
    let proposer_idx = nodes
        .iter()
        .position(|n| n.signer.local_address() == proposer_address)
        .unwrap();
    assert_eq!(proposer_idx, 3);

    // Every node reads the same chain, so the checkpoint each one derives is
    // known in advance
    let blocks = chain.blocks_in_range(101, 150, true).await.unwrap();
    let expected = Checkpoint {
        proposer: proposer_address,
        start_block: 101,
        end_block: 150,
        root_hash: compute_root(&blocks),
    };
    let hash = expected.hash();

    // Proposer builds and self-signs: one distinct signer so far
    nodes[proposer_idx]
        .manager
        .start_new_checkpoint(epoch_size)
        .await
        .unwrap();

    assert_eq!(
        nodes[proposer_idx].manager.pool().artifact(&hash),
        Some(Artifact::Checkpoint(expected.clone()))
    );
    assert_eq!(
        nodes[proposer_idx].manager.pool().signature_count(&hash),
        1
    );

    // Two further validators sign the same range: quorum, submission fires
    nodes[0].manager.start_new_checkpoint(epoch_size).await.unwrap();
    nodes[1].manager.start_new_checkpoint(epoch_size).await.unwrap();

    let proposer_pool = nodes[proposer_idx].manager.pool();
    wait_for(|| proposer_pool.signature_count(&hash) >= 3).await;
    wait_for(|| nodes[proposer_idx].settlement.submissions.load(Ordering::SeqCst) == 1).await;

    // A fourth signature arrives after quorum: count grows, no resubmission
    nodes[2].manager.start_new_checkpoint(epoch_size).await.unwrap();
    wait_for(|| proposer_pool.signature_count(&hash) == 4).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        nodes[proposer_idx].settlement.submissions.load(Ordering::SeqCst),
        1
    );

    // Only the designated proposer ever submitted
    for (i, node) in nodes.iter().enumerate() {
        if i != proposer_idx {
            assert_eq!(node.settlement.submissions.load(Ordering::SeqCst), 0);
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn non_validator_messages_never_touch_the_pool() {
    let hub = InMemoryHub::new();
    let chain = shared_chain(200);
    let nodes = build_committee(4, &hub, chain);

    // An outsider with a perfectly valid key that is not in the committee
    let outsider = Ed25519Signer::from_seed([99u8; 32]);
    let endpoint = hub.join();

    let forged = Checkpoint {
        proposer: outsider.local_address(),
        start_block: 101,
        end_block: 150,
        root_hash: Hash::digest(b"forged root"),
    };
    let hash = forged.hash();
    let signature = outsider.sign(&hash).unwrap();

    endpoint
        .broadcast(&GossipMessage::Checkpoint(CheckpointMessage {
            checkpoint: forged,
            signature,
        }))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    for node in &nodes {
        assert_eq!(node.manager.pool().signature_count(&hash), 0);
        assert!(node.manager.pool().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ack_votes_aggregate_across_the_committee() {
    let hub = InMemoryHub::new();
    let chain = shared_chain(10);
    let nodes = build_committee(4, &hub, chain);

    let epoch = 5;
    let ack = Ack {
        proposer: nodes[0].manager.validator_set().proposer(epoch),
        epoch,
    };
    let hash = ack.hash();

    for node in nodes.iter().take(3) {
        node.manager.submit_ack(epoch).await.unwrap();
    }

    // Every node converges on three distinct ack signers
    for node in &nodes {
        let pool = node.manager.pool();
        wait_for(|| pool.signature_count(&hash) == 3).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_signature_is_dropped() {
    let hub = InMemoryHub::new();
    let chain = shared_chain(10);
    let nodes = build_committee(2, &hub, chain);

    let ack = Ack {
        proposer: nodes[0].signer.local_address(),
        epoch: 1,
    };
    let hash = ack.hash();
    let mut signature = nodes[0].signer.sign(&hash).unwrap();
    signature[50] ^= 0xff;

    let endpoint = hub.join();
    endpoint
        .broadcast(&GossipMessage::Ack(AckMessage { ack, signature }))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    for node in &nodes {
        assert_eq!(node.manager.pool().signature_count(&hash), 0);
    }
}
