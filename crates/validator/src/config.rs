//! Validator Configuration

use serde::{Deserialize, Serialize};

/// Validator node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Gossip listen address
    pub listen_addr: String,
    /// Gossip peer addresses
    pub peers: Vec<String>,
    /// Blocks per checkpoint epoch
    pub epoch_size: u64,
    /// Seconds between checkpoint attempts
    pub checkpoint_interval_secs: u64,
    /// Block time in milliseconds
    pub block_time_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9100".to_string(),
            peers: Vec::new(),
            epoch_size: 50,
            checkpoint_interval_secs: 30,
            block_time_ms: 500,
        }
    }
}
