//! Checkpoint protocol errors

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the checkpoint pipeline
///
/// Inbound-message validation failures are not represented here: they are
/// logged and dropped at the dispatch layer, never returned to a caller.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("epoch size must be greater than zero")]
    InvalidEpochSize,

    #[error("chain query failed: {0}")]
    Chain(anyhow::Error),

    #[error("settlement layer query failed: {0}")]
    Settlement(anyhow::Error),

    #[error("signing failed: {0}")]
    Signer(anyhow::Error),

    #[error("transport failure: {0}")]
    Transport(anyhow::Error),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}
