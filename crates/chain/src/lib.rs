//! L2 Chain - Local block chain substrate
//!
//! This crate provides the chain layer the checkpoint protocol reads from:
//! - Core primitives (addresses, hashes, headers, blocks)
//! - Concurrent in-memory block storage with optional disk persistence
//! - Fixed-interval block production loop

pub mod persistence;
pub mod producer;
pub mod store;
pub mod types;

pub use persistence::{ChainDb, ChainMetadata, ChainPersistence};
pub use producer::{BlockProducer, BlockProducerConfig, BlockUpdate};
pub use store::{BlockReader, BlockStore};
pub use types::{Address, Block, Hash, Header};

/// Default block time in milliseconds
pub const DEFAULT_BLOCK_TIME_MS: u64 = 500;
