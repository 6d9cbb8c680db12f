//! L2 Checkpoint - Threshold-signed commitments to block ranges
//!
//! Architecture:
//! - A periodic trigger packages a contiguous block range into a Checkpoint
//! - The checkpoint is self-signed, pooled, and gossiped to the committee
//! - Inbound signatures are authenticated and aggregated per content hash
//! - At quorum (2/3 of the validator set) the proposer submits to settlement
//! - Ack/NoAck votes drive proposer rotation through the same pool

pub mod error;
pub mod gossip;
pub mod manager;
pub mod pool;
pub mod signer;
pub mod types;
pub mod validators;

pub use error::CheckpointError;
pub use gossip::{CheckpointTransport, InMemoryHub, MessageHandler, WsGossip};
pub use manager::{CheckpointManager, SettlementClient};
pub use pool::SignaturePool;
pub use signer::{Ed25519Signer, Signer};
pub use types::*;
pub use validators::ValidatorSet;
