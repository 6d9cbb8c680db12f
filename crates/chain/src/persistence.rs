//! Persistence Layer for chain state
//!
//! Uses sled embedded database to persist blocks across restarts.
//! State is saved periodically and on shutdown.

use crate::store::BlockStore;
use crate::types::Block;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

/// Metadata about the persisted chain
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChainMetadata {
    /// Chain height at last save
    pub height: u64,
    /// Total blocks stored
    pub block_count: u64,
    /// Last save timestamp
    pub last_save_ts: i64,
}

impl Default for ChainMetadata {
    fn default() -> Self {
        Self {
            height: 0,
            block_count: 0,
            last_save_ts: 0,
        }
    }
}

/// Persistent storage for chain state
pub struct ChainDb {
    /// Sled database instance
    db: Db,
    /// Blocks tree, keyed by big-endian height for ordered iteration
    blocks: sled::Tree,
    /// Metadata tree
    metadata: sled::Tree,
}

impl ChainDb {
    /// Open or create a chain database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let blocks = db.open_tree("blocks")?;
        let metadata = db.open_tree("metadata")?;

        tracing::info!("Opened chain database at {:?}", path.as_ref());

        Ok(Self {
            db,
            blocks,
            metadata,
        })
    }

    /// Store a block
    pub fn store_block(&self, block: &Block) -> anyhow::Result<()> {
        let bytes = bincode::serialize(block)?;
        self.blocks.insert(block.number().to_be_bytes(), bytes)?;
        Ok(())
    }

    /// Get a block by height
    pub fn get_block(&self, number: u64) -> anyhow::Result<Option<Block>> {
        match self.blocks.get(number.to_be_bytes())? {
            Some(bytes) => {
                let block: Block = bincode::deserialize(&bytes)?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Get all blocks in height order (for loading into memory)
    pub fn get_all_blocks(&self) -> anyhow::Result<Vec<Block>> {
        let mut blocks = Vec::new();

        for result in self.blocks.iter() {
            let (_, value) = result?;
            let block: Block = bincode::deserialize(&value)?;
            blocks.push(block);
        }

        Ok(blocks)
    }

    /// Save chain metadata
    pub fn save_metadata(&self, metadata: &ChainMetadata) -> anyhow::Result<()> {
        let bytes = bincode::serialize(metadata)?;
        self.metadata.insert("chain", bytes)?;
        Ok(())
    }

    /// Load chain metadata
    pub fn load_metadata(&self) -> anyhow::Result<Option<ChainMetadata>> {
        match self.metadata.get("chain")? {
            Some(bytes) => {
                let metadata: ChainMetadata = bincode::deserialize(&bytes)?;
                Ok(Some(metadata))
            }
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) -> anyhow::Result<()> {
        self.blocks.clear()?;
        self.metadata.clear()?;
        Ok(())
    }
}

/// Extension trait to add persistence to BlockStore
pub trait ChainPersistence {
    /// Save all blocks to persistent storage
    fn save_to_disk(&self, db: &ChainDb) -> anyhow::Result<usize>;

    /// Load all blocks from persistent storage
    fn load_from_disk(&self, db: &ChainDb) -> anyhow::Result<usize>;
}

impl ChainPersistence for BlockStore {
    fn save_to_disk(&self, db: &ChainDb) -> anyhow::Result<usize> {
        let mut count = 0;

        for block in self.all_blocks() {
            db.store_block(&block)?;
            count += 1;
        }

        db.flush()?;
        tracing::info!("Saved {} blocks to disk", count);

        Ok(count)
    }

    fn load_from_disk(&self, db: &ChainDb) -> anyhow::Result<usize> {
        let blocks = db.get_all_blocks()?;
        let count = blocks.len();

        for block in blocks {
            self.insert_block(block);
        }

        tracing::info!("Loaded {} blocks from disk", count);

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash, Header};
    use tempfile::tempdir;

    #[test]
    fn test_store_and_load_block() {
        let dir = tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();

        let block = Block::new(
            Header {
                number: 42,
                parent_hash: Hash::digest(b"parent"),
                timestamp: 1000,
            },
            vec![vec![1, 2, 3, 4]],
        );

        db.store_block(&block).unwrap();
        db.flush().unwrap();

        let loaded = db.get_block(42).unwrap().unwrap();
        assert_eq!(loaded, block);
        assert!(db.get_block(43).unwrap().is_none());
    }

    #[test]
    fn test_metadata() {
        let dir = tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();

        let metadata = ChainMetadata {
            height: 1000,
            block_count: 1001,
            last_save_ts: 12345,
        };

        db.save_metadata(&metadata).unwrap();

        let loaded = db.load_metadata().unwrap().unwrap();
        assert_eq!(loaded.height, 1000);
        assert_eq!(loaded.block_count, 1001);
    }

    #[test]
    fn test_round_trip_through_store() {
        let dir = tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();

        let store = BlockStore::new();
        for n in 1..=3 {
            store.insert_block(Block::new(
                Header {
                    number: n,
                    parent_hash: Hash::ZERO,
                    timestamp: n,
                },
                Vec::new(),
            ));
        }

        let saved = store.save_to_disk(&db).unwrap();
        assert_eq!(saved, 4); // genesis + 3

        let restored = BlockStore::new();
        let loaded = restored.load_from_disk(&db).unwrap();
        assert_eq!(loaded, 4);
        assert_eq!(restored.height(), 3);
    }
}
