//! Block Producer - fixed-interval production loop
//!
//! Produces blocks on a fixed tick so the local chain keeps advancing and
//! checkpoint ranges have something to cover.

use crate::store::BlockStore;
use crate::types::{Block, Hash, Header};
use crate::DEFAULT_BLOCK_TIME_MS;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::broadcast;

/// Block update event sent to subscribers
#[derive(Clone, Debug)]
pub struct BlockUpdate {
    /// Block height
    pub number: u64,
    /// Hash of the produced block
    pub blockhash: Hash,
    /// Block timestamp
    pub timestamp: u64,
}

/// Block producer configuration
#[derive(Clone, Debug)]
pub struct BlockProducerConfig {
    /// Block time in milliseconds
    pub block_time_ms: u64,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for BlockProducerConfig {
    fn default() -> Self {
        Self {
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            verbose: false,
        }
    }
}

/// Block Producer
///
/// Runs the production loop, extending the local chain one block per tick.
pub struct BlockProducer {
    /// Chain the produced blocks are appended to
    store: Arc<BlockStore>,
    /// Block update broadcaster
    update_sender: broadcast::Sender<BlockUpdate>,
    /// Configuration
    config: BlockProducerConfig,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl BlockProducer {
    /// Create a new block producer
    pub fn new(store: Arc<BlockStore>, config: BlockProducerConfig) -> Self {
        let (update_sender, _) = broadcast::channel(64);

        Self {
            store,
            update_sender,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to block updates
    pub fn subscribe(&self) -> broadcast::Receiver<BlockUpdate> {
        self.update_sender.subscribe()
    }

    /// Check if the block producer is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the block producer
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Produce and store the next block
    pub fn produce_next(&self) -> BlockUpdate {
        let parent = self.store.latest_header();
        let header = Header {
            number: parent.number + 1,
            parent_hash: parent.hash(),
            timestamp: chrono::Utc::now().timestamp() as u64,
        };

        let block = Block::new(header, Vec::new());
        let update = BlockUpdate {
            number: block.number(),
            blockhash: block.hash(),
            timestamp: block.header.timestamp,
        };

        self.store.insert_block(block);
        update
    }

    /// Run the block producer (tokio)
    pub async fn run_async(self) {
        self.running.store(true, Ordering::SeqCst);

        let block_duration = Duration::from_millis(self.config.block_time_ms);
        let mut interval = tokio::time::interval(block_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!("Block producer started ({}ms blocks)", self.config.block_time_ms);

        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;

            let update = self.produce_next();

            // Broadcast to subscribers (ignore errors if no subscribers)
            let _ = self.update_sender.send(update.clone());

            if self.config.verbose {
                tracing::debug!("Produced block {} ({})", update.number, update.blockhash);
            } else if update.number % 100 == 0 {
                tracing::info!("Chain at height {}", update.number);
            }
        }

        tracing::info!("Block producer stopped at height {}", self.store.height());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produce_next_extends_chain() {
        let store = Arc::new(BlockStore::new());
        let producer = BlockProducer::new(store.clone(), BlockProducerConfig::default());

        let first = producer.produce_next();
        let second = producer.produce_next();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(store.height(), 2);

        let block = store.block(2).unwrap();
        assert_eq!(block.header.parent_hash, store.block(1).unwrap().hash());
    }

    #[test]
    fn test_subscribers_receive_updates() {
        let store = Arc::new(BlockStore::new());
        let producer = BlockProducer::new(store, BlockProducerConfig::default());
        let mut updates = producer.subscribe();

        let produced = producer.produce_next();
        let _ = producer.update_sender.send(produced.clone());

        let received = updates.try_recv().unwrap();
        assert_eq!(received.number, produced.number);
        assert_eq!(received.blockhash, produced.blockhash);
    }
}
