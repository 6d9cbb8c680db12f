//! RPC settlement client
//!
//! Currently a stub implementation since the settlement contract isn't
//! deployed. When ready, this will build and send commitment transactions to
//! the settlement layer over RPC.

use async_trait::async_trait;
use l2_chain::Address;
use l2_checkpoint::{Checkpoint, MessageSignature, SettlementClient};
use tokio::sync::RwLock;

/// Commits finalized checkpoints to the settlement layer (stub implementation)
pub struct RpcSettlementClient {
    /// Settlement RPC URL (stored for future use)
    rpc_url: String,
    /// Settlement contract address (not deployed yet)
    contract_address: Option<Address>,
    /// Height covered by the last submitted checkpoint
    last_committed: RwLock<u64>,
}

impl RpcSettlementClient {
    /// Create a new settlement client
    pub fn new(rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            contract_address: None,
            last_committed: RwLock::new(0),
        }
    }

    /// Set the settlement contract address
    pub fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }

    /// Get the RPC URL
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl SettlementClient for RpcSettlementClient {
    async fn last_committed_height(&self) -> anyhow::Result<u64> {
        // Contract not deployed, report the locally tracked height
        Ok(*self.last_committed.read().await)
    }

    /// Submit a checkpoint (stub - settlement contract not deployed)
    ///
    /// When the contract is deployed, this will:
    /// 1. Build a commitment transaction over the checkpoint and signatures
    /// 2. Send it to the settlement RPC
    /// 3. Wait for inclusion
    async fn submit_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        signatures: Vec<MessageSignature>,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            "Would submit checkpoint [{}, {}] with {} signatures to {} (settlement contract not deployed)",
            checkpoint.start_block,
            checkpoint.end_block,
            signatures.len(),
            self.rpc_url
        );

        *self.last_committed.write().await = checkpoint.end_block;
        Ok(())
    }
}
