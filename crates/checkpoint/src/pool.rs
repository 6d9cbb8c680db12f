//! Signature aggregation pool
//!
//! Hash-keyed store of "artifact + collected signatures", shared by the
//! checkpoint, ack, and noack sub-protocols. DashMap gives per-entry locking,
//! so concurrent callers touching different hashes never serialize on each
//! other.

use crate::types::{Artifact, MessageSignature};
use dashmap::DashMap;
use l2_chain::{Address, Hash};
use std::collections::HashMap;

/// One pool entry: the artifact (once known) and one signature per address
#[derive(Debug, Default)]
struct AggregationRecord {
    /// Payload; may arrive after the first signatures under network reordering
    artifact: Option<Artifact>,
    /// Collected signatures, unique per address (last write wins)
    signatures: HashMap<Address, Vec<u8>>,
    /// Set once the quorum side effect for this hash has fired
    submitted: bool,
}

/// Concurrent signature aggregation pool
#[derive(Debug, Default)]
pub struct SignaturePool {
    records: DashMap<Hash, AggregationRecord>,
}

impl SignaturePool {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Register an artifact under its content hash
    ///
    /// No-op if a record for that hash already holds a payload.
    pub fn add_message(&self, artifact: Artifact) {
        let hash = artifact.hash();
        let mut record = self.records.entry(hash).or_default();
        if record.artifact.is_none() {
            record.artifact = Some(artifact);
        }
    }

    /// Register one validator's signature for a content hash
    ///
    /// Creates the record if the payload has not arrived yet. Re-submission by
    /// the same address overwrites, it never increases the count.
    pub fn add_signature(&self, signature: MessageSignature) {
        self.records
            .entry(signature.hash)
            .or_default()
            .signatures
            .insert(signature.address, signature.signature);
    }

    /// Number of distinct addresses with a registered signature for a hash
    ///
    /// Returns 0 for an unknown hash.
    pub fn signature_count(&self, hash: &Hash) -> usize {
        self.records
            .get(hash)
            .map(|r| r.signatures.len())
            .unwrap_or(0)
    }

    /// The artifact registered under a hash, if known
    pub fn artifact(&self, hash: &Hash) -> Option<Artifact> {
        self.records.get(hash).and_then(|r| r.artifact.clone())
    }

    /// All collected signatures for a hash
    pub fn signatures(&self, hash: &Hash) -> Vec<MessageSignature> {
        self.records
            .get(hash)
            .map(|r| {
                r.signatures
                    .iter()
                    .map(|(address, signature)| MessageSignature {
                        hash: *hash,
                        address: *address,
                        signature: signature.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Atomically claim the quorum side effect for a hash
    ///
    /// Returns true exactly once per hash; concurrent signature arrivals that
    /// each observe quorum race through here and only one wins.
    pub fn mark_submitted(&self, hash: &Hash) -> bool {
        let mut record = self.records.entry(*hash).or_default();
        if record.submitted {
            false
        } else {
            record.submitted = true;
            true
        }
    }

    /// Drop the record for a finalized or superseded hash
    pub fn evict(&self, hash: &Hash) {
        self.records.remove(hash);
    }

    /// Number of tracked hashes
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
