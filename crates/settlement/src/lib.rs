//! L1 Settlement - Settlement-layer clients
//!
//! Implementations of the checkpoint protocol's settlement interface:
//! - Deriving the last committed height while the contract isn't deployed
//! - Recording would-be checkpoint submissions for the future L1 integration

pub mod chain_backed;
pub mod rpc_client;

pub use chain_backed::ChainBackedSettlement;
pub use rpc_client::RpcSettlementClient;
