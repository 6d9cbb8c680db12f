//! Checkpoint orchestration
//!
//! Drives the end-to-end pipeline: range determination, checkpoint
//! construction, self-signing, pool registration, broadcast, and the
//! quorum-triggered side effects (settlement submission for checkpoints,
//! proposer rotation for ack/noack votes). Inbound gossip is authenticated
//! against the validator set before it can touch the pool.

use crate::error::CheckpointError;
use crate::gossip::{CheckpointTransport, MessageHandler};
use crate::pool::SignaturePool;
use crate::signer::Signer;
use crate::types::{
    compute_root, Ack, AckMessage, Artifact, Checkpoint, CheckpointMessage, GossipMessage,
    MessageSignature, NoAck, NoAckMessage,
};
use crate::validators::ValidatorSet;
use async_trait::async_trait;
use l2_chain::{Address, BlockReader, Hash};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout applied to collaborator calls
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the external settlement layer receiving finalized checkpoints
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Height of the last checkpoint committed on the settlement layer
    async fn last_committed_height(&self) -> anyhow::Result<u64>;

    /// Submit a finalized checkpoint with its quorum of signatures
    async fn submit_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        signatures: Vec<MessageSignature>,
    ) -> anyhow::Result<()>;
}

/// The next checkpoint range after `last_committed`
///
/// Successive calls with increasing `last_committed` yield contiguous,
/// strictly increasing, non-overlapping ranges.
pub fn determine_checkpoint_range(last_committed: u64, epoch_size: u64) -> (u64, u64) {
    (last_committed + 1, last_committed + epoch_size)
}

/// Checkpoint protocol orchestrator
///
/// Cheap to clone; clones share the pool and collaborators, so the dispatch
/// callback and the pipeline driver operate on the same state.
#[derive(Clone)]
pub struct CheckpointManager {
    chain: Arc<dyn BlockReader>,
    settlement: Arc<dyn SettlementClient>,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn CheckpointTransport>,
    validator_set: ValidatorSet,
    pool: Arc<SignaturePool>,
    /// Hash of the epoch checkpoint currently being aggregated
    current_checkpoint: Arc<RwLock<Option<Hash>>>,
    /// Timeout applied to chain, settlement, and submission calls
    op_timeout: Duration,
}

impl CheckpointManager {
    pub fn new(
        chain: Arc<dyn BlockReader>,
        settlement: Arc<dyn SettlementClient>,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn CheckpointTransport>,
        validator_set: ValidatorSet,
    ) -> Self {
        Self {
            chain,
            settlement,
            signer,
            transport,
            validator_set,
            pool: Arc::new(SignaturePool::new()),
            current_checkpoint: Arc::new(RwLock::new(None)),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Override the collaborator-call timeout
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// The shared aggregation pool
    pub fn pool(&self) -> &SignaturePool {
        &self.pool
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        &self.validator_set
    }

    /// Subscribe the dispatch callback on the gossip transport
    pub fn start(&self) -> Result<(), CheckpointError> {
        let mgr = self.clone();
        let handler: MessageHandler = Arc::new(move |message| {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                mgr.dispatch(message).await;
            });
        });

        self.transport
            .subscribe(handler)
            .map_err(CheckpointError::Transport)
    }

    /// Release the transport subscription; idempotent
    pub fn close(&self) {
        self.transport.close();
    }

    /// Build, sign, register, and gossip the checkpoint for the next epoch
    ///
    /// Each step's failure aborts the remaining steps with no rollback of
    /// already-applied pool state; retrying the whole operation is safe
    /// because pool registration is idempotent.
    pub async fn start_new_checkpoint(&self, epoch_size: u64) -> Result<(), CheckpointError> {
        if epoch_size == 0 {
            return Err(CheckpointError::InvalidEpochSize);
        }

        // Step 1: last committed height on the settlement layer
        let last_committed = timeout(self.op_timeout, self.settlement.last_committed_height())
            .await
            .map_err(|_| CheckpointError::Timeout("settlement layer query", self.op_timeout))?
            .map_err(CheckpointError::Settlement)?;

        // Step 2: determine the next range and fetch it from the chain
        let (start, end) = determine_checkpoint_range(last_committed, epoch_size);
        let blocks = timeout(self.op_timeout, self.chain.blocks_in_range(start, end, true))
            .await
            .map_err(|_| CheckpointError::Timeout("chain query", self.op_timeout))?
            .map_err(CheckpointError::Chain)?;
        if blocks.len() as u64 != end - start + 1 {
            return Err(CheckpointError::Chain(anyhow::anyhow!(
                "chain returned {} blocks for range [{start}, {end}]",
                blocks.len()
            )));
        }

        // Step 3: build the checkpoint for this epoch
        let epoch = end / epoch_size;
        let checkpoint = Checkpoint {
            proposer: self.validator_set.proposer(epoch),
            start_block: start,
            end_block: end,
            root_hash: compute_root(&blocks),
        };

        tracing::debug!(
            "Starting checkpoint for range [{}, {}], epoch {}, proposer {}",
            start,
            end,
            epoch,
            checkpoint.proposer
        );

        // Step 4: sign locally and register in the pool
        let hash = checkpoint.hash();
        let signature = self.signer.sign(&hash).map_err(CheckpointError::Signer)?;

        // The previous epoch's checkpoint is superseded; drop its record
        if let Some(previous) = self.current_checkpoint.write().replace(hash) {
            if previous != hash {
                self.pool.evict(&previous);
            }
        }

        self.pool.add_message(Artifact::Checkpoint(checkpoint.clone()));
        self.add_checkpoint_signature(&checkpoint, self.signer.local_address(), signature.clone())
            .await;

        // Step 5: gossip to the committee
        self.transport
            .broadcast(&GossipMessage::Checkpoint(CheckpointMessage {
                checkpoint,
                signature,
            }))
            .map_err(CheckpointError::Transport)?;

        Ok(())
    }

    /// Vote to acknowledge the proposer for an epoch
    pub async fn submit_ack(&self, epoch: u64) -> Result<(), CheckpointError> {
        let ack = Ack {
            proposer: self.validator_set.proposer(epoch),
            epoch,
        };

        let hash = ack.hash();
        let signature = self.signer.sign(&hash).map_err(CheckpointError::Signer)?;

        self.pool.add_message(Artifact::Ack(ack.clone()));
        self.add_ack_signature(&ack, self.signer.local_address(), signature.clone());

        self.transport
            .broadcast(&GossipMessage::Ack(AckMessage { ack, signature }))
            .map_err(CheckpointError::Transport)?;

        Ok(())
    }

    /// Vote against an unresponsive proposer for an epoch
    pub async fn submit_no_ack(&self, epoch: u64) -> Result<(), CheckpointError> {
        let no_ack = NoAck {
            proposer: self.validator_set.proposer(epoch),
            epoch,
        };

        let hash = no_ack.hash();
        let signature = self.signer.sign(&hash).map_err(CheckpointError::Signer)?;

        self.pool.add_message(Artifact::NoAck(no_ack.clone()));
        self.add_no_ack_signature(&no_ack, self.signer.local_address(), signature.clone());

        self.transport
            .broadcast(&GossipMessage::NoAck(NoAckMessage { no_ack, signature }))
            .map_err(CheckpointError::Transport)?;

        Ok(())
    }

    async fn dispatch(&self, message: GossipMessage) {
        match message {
            GossipMessage::Checkpoint(msg) => self.handle_checkpoint_message(msg).await,
            GossipMessage::Ack(msg) => self.handle_ack_message(msg),
            GossipMessage::NoAck(msg) => self.handle_no_ack_message(msg),
        }
    }

    /// Authenticate the sender of an inbound message against the validator set
    ///
    /// Validation failures are terminal for the single message only: logged
    /// and dropped, never surfaced to a caller.
    fn authenticate_sender(&self, kind: &str, hash: &Hash, signature: &[u8]) -> Option<Address> {
        let sender = match self.signer.recover_address(hash, signature) {
            Ok(sender) => sender,
            Err(e) => {
                tracing::error!("Failed to recover address from {} signature: {}", kind, e);
                return None;
            }
        };

        if !self.validator_set.is_validator(&sender) {
            tracing::info!(
                "Ignoring {} message from non-validator {} ({})",
                kind,
                sender,
                hash
            );
            return None;
        }

        Some(sender)
    }

    async fn handle_checkpoint_message(&self, msg: CheckpointMessage) {
        let hash = msg.hash();
        let Some(sender) = self.authenticate_sender("checkpoint", &hash, msg.signature()) else {
            return;
        };

        self.pool
            .add_message(Artifact::Checkpoint(msg.checkpoint.clone()));
        self.add_checkpoint_signature(&msg.checkpoint, sender, msg.signature)
            .await;
    }

    fn handle_ack_message(&self, msg: AckMessage) {
        let hash = msg.hash();
        let Some(sender) = self.authenticate_sender("ack", &hash, msg.signature()) else {
            return;
        };

        self.pool.add_message(Artifact::Ack(msg.ack.clone()));
        self.add_ack_signature(&msg.ack, sender, msg.signature);
    }

    fn handle_no_ack_message(&self, msg: NoAckMessage) {
        let hash = msg.hash();
        let Some(sender) = self.authenticate_sender("noack", &hash, msg.signature()) else {
            return;
        };

        self.pool.add_message(Artifact::NoAck(msg.no_ack.clone()));
        self.add_no_ack_signature(&msg.no_ack, sender, msg.signature);
    }

    /// Register a checkpoint signature and submit on quorum
    ///
    /// Submission fires at most once per hash even when concurrent signature
    /// arrivals each observe a quorum-sized count.
    async fn add_checkpoint_signature(
        &self,
        checkpoint: &Checkpoint,
        address: Address,
        signature: Vec<u8>,
    ) {
        let hash = checkpoint.hash();
        self.pool.add_signature(MessageSignature {
            hash,
            address,
            signature,
        });

        let total = self.pool.signature_count(&hash);
        if total < self.validator_set.threshold() {
            return;
        }

        // Only the designated proposer submits
        if checkpoint.proposer != self.signer.local_address() {
            return;
        }

        if !self.pool.mark_submitted(&hash) {
            return;
        }

        tracing::info!(
            "Received 2/3 signatures for checkpoint {}, submitting to settlement layer ({} signatures, proposer {})",
            hash,
            total,
            checkpoint.proposer
        );

        let signatures = self.pool.signatures(&hash);
        match timeout(
            self.op_timeout,
            self.settlement.submit_checkpoint(checkpoint, signatures),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(
                    "Checkpoint {} submitted for range [{}, {}]",
                    hash,
                    checkpoint.start_block,
                    checkpoint.end_block
                );
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to submit checkpoint {}: {}", hash, e);
            }
            Err(_) => {
                tracing::error!(
                    "Checkpoint {} submission timed out after {:?}",
                    hash,
                    self.op_timeout
                );
            }
        }
    }

    fn add_ack_signature(&self, ack: &Ack, address: Address, signature: Vec<u8>) {
        let hash = ack.hash();
        self.pool.add_signature(MessageSignature {
            hash,
            address,
            signature,
        });

        let total = self.pool.signature_count(&hash);
        if total < self.validator_set.threshold() {
            return;
        }
        if !self.pool.mark_submitted(&hash) {
            return;
        }

        tracing::info!(
            "Received 2/3 signatures for ack on epoch {}, rotating checkpoint proposer ({} signatures)",
            ack.epoch,
            total
        );
    }

    fn add_no_ack_signature(&self, no_ack: &NoAck, address: Address, signature: Vec<u8>) {
        let hash = no_ack.hash();
        self.pool.add_signature(MessageSignature {
            hash,
            address,
            signature,
        });

        let total = self.pool.signature_count(&hash);
        if total < self.validator_set.threshold() {
            return;
        }
        if !self.pool.mark_submitted(&hash) {
            return;
        }

        tracing::info!(
            "Received 2/3 signatures for noack on epoch {}, rotating checkpoint proposer ({} signatures)",
            no_ack.epoch,
            total
        );
    }
}
