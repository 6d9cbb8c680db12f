//! Core types for checkpoint commitment and proposer-rotation voting

use borsh::{BorshDeserialize, BorshSerialize};
use l2_chain::{Address, Block, Hash};
use serde::{Deserialize, Serialize};

/// A signed commitment to a contiguous range of chain blocks
///
/// Immutable once hashed; superseded when the next epoch's checkpoint begins.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Validator designated to submit this checkpoint to the settlement layer
    pub proposer: Address,
    /// First block covered (inclusive)
    pub start_block: u64,
    /// Last block covered (inclusive)
    pub end_block: u64,
    /// Digest over the covered block hashes, in chain order
    pub root_hash: Hash,
}

/// Domain-tagged content hash, so artifacts of different kinds with equal
/// field values never collide in the shared pool
fn tagged_hash(tag: &[u8], payload: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tag);
    hasher.update(payload);
    Hash::new(*hasher.finalize().as_bytes())
}

impl Checkpoint {
    /// Content hash: identical field values hash identically regardless of
    /// construction order
    pub fn hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("checkpoint serialization should not fail");
        tagged_hash(b"checkpoint", &bytes)
    }
}

/// Vote to keep the current checkpoint proposer
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Ack {
    /// Proposer the vote refers to
    pub proposer: Address,
    /// Epoch the vote refers to
    pub epoch: u64,
}

impl Ack {
    pub fn hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("ack serialization should not fail");
        tagged_hash(b"ack", &bytes)
    }
}

/// Vote to rotate away from an unresponsive checkpoint proposer
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct NoAck {
    /// Proposer the vote refers to
    pub proposer: Address,
    /// Epoch the vote refers to
    pub epoch: u64,
}

impl NoAck {
    pub fn hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("noack serialization should not fail");
        tagged_hash(b"noack", &bytes)
    }
}

/// Payload stored in the aggregation pool, one variant per message kind
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Artifact {
    Checkpoint(Checkpoint),
    Ack(Ack),
    NoAck(NoAck),
}

impl Artifact {
    pub fn hash(&self) -> Hash {
        match self {
            Artifact::Checkpoint(c) => c.hash(),
            Artifact::Ack(a) => a.hash(),
            Artifact::NoAck(n) => n.hash(),
        }
    }
}

/// One vote by one validator on one content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSignature {
    pub hash: Hash,
    pub address: Address,
    pub signature: Vec<u8>,
}

/// Wire message carrying a checkpoint and the sender's signature over its hash
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CheckpointMessage {
    pub checkpoint: Checkpoint,
    pub signature: Vec<u8>,
}

impl CheckpointMessage {
    pub fn hash(&self) -> Hash {
        self.checkpoint.hash()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Wire message carrying an ack vote
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AckMessage {
    pub ack: Ack,
    pub signature: Vec<u8>,
}

impl AckMessage {
    pub fn hash(&self) -> Hash {
        self.ack.hash()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Wire message carrying a noack vote
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct NoAckMessage {
    pub no_ack: NoAck,
    pub signature: Vec<u8>,
}

impl NoAckMessage {
    pub fn hash(&self) -> Hash {
        self.no_ack.hash()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Message kinds exchanged over validator gossip
///
/// Closed set: dispatch matches exhaustively, so adding a kind is a
/// compile-time-checked change.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum GossipMessage {
    Checkpoint(CheckpointMessage),
    Ack(AckMessage),
    NoAck(NoAckMessage),
}

impl GossipMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("GossipMessage serialization should not fail")
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, borsh::io::Error> {
        borsh::from_slice(data)
    }
}

/// Digest over a block range, in chain order
pub fn compute_root(blocks: &[Block]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for block in blocks {
        hasher.update(block.hash().as_bytes());
    }
    Hash::new(*hasher.finalize().as_bytes())
}
