//! In-memory block storage using DashMap for concurrent access

use crate::types::{Block, Header};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Read access to the local chain
///
/// This is the interface the checkpoint protocol consumes. Implementations may
/// be backed by a remote node, so the methods are async and fallible; callers
/// are expected to apply their own timeouts.
#[async_trait]
pub trait BlockReader: Send + Sync {
    /// Latest header of the local chain
    async fn header(&self) -> anyhow::Result<Header>;

    /// Blocks in the inclusive range `[start, end]`
    ///
    /// When `full` is false the returned blocks carry headers only.
    /// Fails if any block in the range is not available.
    async fn blocks_in_range(&self, start: u64, end: u64, full: bool)
        -> anyhow::Result<Vec<Block>>;
}

/// Thread-safe in-memory block storage
///
/// Uses DashMap for lock-free concurrent reads and fine-grained write locks.
/// Always holds at least the genesis block, so there is always a tip.
#[derive(Clone)]
pub struct BlockStore {
    /// Blocks keyed by height
    blocks: Arc<DashMap<u64, Block>>,
    /// Height of the highest stored block
    tip: Arc<RwLock<u64>>,
}

impl BlockStore {
    /// Create a new store seeded with the genesis block
    pub fn new() -> Self {
        let blocks = DashMap::new();
        blocks.insert(0, Block::genesis());
        Self {
            blocks: Arc::new(blocks),
            tip: Arc::new(RwLock::new(0)),
        }
    }

    /// Insert a block, advancing the tip if it extends the chain
    pub fn insert_block(&self, block: Block) {
        let number = block.number();
        self.blocks.insert(number, block);

        let mut tip = self.tip.write();
        if number > *tip {
            *tip = number;
        }
    }

    /// Get a block by height
    pub fn block(&self, number: u64) -> Option<Block> {
        self.blocks.get(&number).map(|r| r.value().clone())
    }

    /// Current chain height
    pub fn height(&self) -> u64 {
        *self.tip.read()
    }

    /// Header of the block at the tip
    pub fn latest_header(&self) -> Header {
        let tip = *self.tip.read();
        self.blocks
            .get(&tip)
            .map(|r| r.value().header.clone())
            .expect("tip block must exist")
    }

    /// Number of stored blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All stored blocks, in no particular order
    pub fn all_blocks(&self) -> Vec<Block> {
        self.blocks.iter().map(|r| r.value().clone()).collect()
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockReader for BlockStore {
    async fn header(&self) -> anyhow::Result<Header> {
        Ok(self.latest_header())
    }

    async fn blocks_in_range(
        &self,
        start: u64,
        end: u64,
        full: bool,
    ) -> anyhow::Result<Vec<Block>> {
        if start > end {
            anyhow::bail!("invalid block range [{start}, {end}]");
        }

        let mut blocks = Vec::with_capacity((end - start + 1) as usize);
        for number in start..=end {
            let block = self
                .block(number)
                .ok_or_else(|| anyhow::anyhow!("block {number} not in local store"))?;
            blocks.push(if full { block } else { block.without_body() });
        }

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash;

    fn make_block(number: u64) -> Block {
        Block::new(
            Header {
                number,
                parent_hash: Hash::digest(&(number - 1).to_le_bytes()),
                timestamp: number * 10,
            },
            vec![vec![1, 2, 3]],
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = BlockStore::new();
        store.insert_block(make_block(1));
        store.insert_block(make_block(2));

        assert_eq!(store.height(), 2);
        assert_eq!(store.latest_header().number, 2);
        assert_eq!(store.block(1).unwrap().number(), 1);
    }

    #[tokio::test]
    async fn test_blocks_in_range() {
        let store = BlockStore::new();
        for n in 1..=5 {
            store.insert_block(make_block(n));
        }

        let blocks = store.blocks_in_range(2, 4, true).await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].number(), 2);
        assert_eq!(blocks[2].number(), 4);
        assert!(!blocks[0].transactions.is_empty());

        let headers_only = store.blocks_in_range(2, 4, false).await.unwrap();
        assert!(headers_only[0].transactions.is_empty());
    }

    #[tokio::test]
    async fn test_blocks_in_range_missing_block() {
        let store = BlockStore::new();
        store.insert_block(make_block(1));

        assert!(store.blocks_in_range(1, 3, true).await.is_err());
    }
}
