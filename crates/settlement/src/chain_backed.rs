//! Chain-backed settlement stand-in
//!
//! Derives the last committed height deterministically from the current chain
//! height and epoch size. Stands in for the settlement contract until that
//! integration lands; tests rely on the derivation staying exactly
//! `(height / epoch_size + 1) * epoch_size`.

use async_trait::async_trait;
use l2_chain::BlockReader;
use l2_checkpoint::{Checkpoint, MessageSignature, SettlementClient};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Settlement client deriving committed heights from the local chain
pub struct ChainBackedSettlement {
    /// Chain the committed height is derived from
    chain: Arc<dyn BlockReader>,
    /// Checkpoint epoch size
    epoch_size: u64,
    /// Last checkpoint accepted by this stand-in
    last_submitted: RwLock<Option<Checkpoint>>,
}

impl ChainBackedSettlement {
    /// Create a new chain-backed settlement client
    ///
    /// `epoch_size` must be non-zero, it is the divisor of the derivation.
    pub fn new(chain: Arc<dyn BlockReader>, epoch_size: u64) -> Self {
        assert!(epoch_size > 0, "epoch size must be non-zero");
        Self {
            chain,
            epoch_size,
            last_submitted: RwLock::new(None),
        }
    }

    /// The last checkpoint accepted by this stand-in
    pub async fn last_submitted(&self) -> Option<Checkpoint> {
        self.last_submitted.read().await.clone()
    }
}

#[async_trait]
impl SettlementClient for ChainBackedSettlement {
    async fn last_committed_height(&self) -> anyhow::Result<u64> {
        let header = self.chain.header().await?;

        let current_epoch = header.number / self.epoch_size + 1;

        Ok(current_epoch * self.epoch_size)
    }

    async fn submit_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        signatures: Vec<MessageSignature>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            "Recording checkpoint for range [{}, {}] with {} signatures (settlement contract not deployed)",
            checkpoint.start_block,
            checkpoint.end_block,
            signatures.len()
        );

        *self.last_submitted.write().await = Some(checkpoint.clone());
        Ok(())
    }
}
