//! L2 Checkpoint Validator
//!
//! Main entry point for the checkpoint validator node. Produces blocks
//! locally, aggregates committee signatures over gossip, and hands finalized
//! checkpoints to the settlement layer stand-in.
//! Chain state is persisted to disk and survives restarts.

use anyhow::Result;
use clap::Parser;
use l1_settlement::ChainBackedSettlement;
use l2_chain::{
    Address, BlockProducer, BlockProducerConfig, BlockStore, ChainDb, ChainMetadata,
    ChainPersistence,
};
use l2_checkpoint::{CheckpointManager, Ed25519Signer, Signer, ValidatorSet, WsGossip};
use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::NodeConfig;

/// L2 Checkpoint Validator
#[derive(Parser, Debug)]
#[command(name = "l2-validator")]
#[command(about = "Checkpoint-commitment validator for the L2 chain", long_about = None)]
struct Args {
    /// Gossip listen address
    #[arg(long, default_value = "127.0.0.1:9100")]
    listen_addr: String,

    /// Gossip peer address (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Blocks per checkpoint epoch
    #[arg(long, default_value = "50")]
    epoch_size: u64,

    /// Seconds between checkpoint attempts
    #[arg(long, default_value = "30")]
    checkpoint_interval: u64,

    /// Block time in milliseconds
    #[arg(long, default_value = "500")]
    block_time_ms: u64,

    /// Data directory for persistent state
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// File holding the base58-encoded 32-byte signing seed (generated if absent)
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// JSON file listing the committee's base58 addresses
    #[arg(long)]
    validators_file: Option<PathBuf>,

    /// Save chain state every N blocks (0 = only on shutdown)
    #[arg(long, default_value = "300")]
    save_interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Load the local signing key, generating one when the file doesn't exist
fn load_signer(key_file: Option<&PathBuf>) -> Result<Ed25519Signer> {
    let Some(path) = key_file else {
        tracing::warn!("No key file given, using an ephemeral key");
        return Ok(Ed25519Signer::random());
    };

    if path.exists() {
        let encoded = std::fs::read_to_string(path)?;
        let bytes = bs58::decode(encoded.trim()).into_vec()?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("key file must hold a 32-byte seed"))?;
        Ok(Ed25519Signer::from_seed(seed))
    } else {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        std::fs::write(path, bs58::encode(&seed).into_string())?;
        tracing::info!("Generated new signing key at {:?}", path);
        Ok(Ed25519Signer::from_seed(seed))
    }
}

/// Load the committee from a JSON address list
fn load_validator_set(file: Option<&PathBuf>, local: Address) -> Result<ValidatorSet> {
    let Some(path) = file else {
        tracing::warn!("No validator set file given, running a single-validator committee");
        return Ok(ValidatorSet::new(vec![local]));
    };

    let raw = std::fs::read_to_string(path)?;
    let encoded: Vec<String> = serde_json::from_str(&raw)?;
    let mut validators = Vec::with_capacity(encoded.len());
    for entry in &encoded {
        validators.push(Address::from_base58(entry)?);
    }

    let set = ValidatorSet::new(validators);
    if !set.is_validator(&local) {
        tracing::warn!(
            "Local address {} is not in the configured validator set",
            local
        );
    }

    Ok(set)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.epoch_size > 0, "epoch size must be greater than zero");

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig {
        listen_addr: args.listen_addr.clone(),
        peers: args.peers.clone(),
        epoch_size: args.epoch_size,
        checkpoint_interval_secs: args.checkpoint_interval,
        block_time_ms: args.block_time_ms,
    };

    tracing::info!("Starting L2 Checkpoint Validator");
    tracing::info!("  Gossip: {}", config.listen_addr);
    tracing::info!("  Peers: {:?}", config.peers);
    tracing::info!("  Epoch size: {} blocks", config.epoch_size);
    tracing::info!("  Checkpoint interval: {}s", config.checkpoint_interval_secs);
    tracing::info!("  Block time: {}ms", config.block_time_ms);
    tracing::info!("  Data directory: {:?}", args.data_dir);

    // Create data directory if it doesn't exist
    std::fs::create_dir_all(&args.data_dir)?;

    // Open persistent chain storage and load existing blocks
    let chain_db = Arc::new(ChainDb::open(args.data_dir.join("chain"))?);
    let store = Arc::new(BlockStore::new());
    if let Some(metadata) = chain_db.load_metadata()? {
        tracing::info!(
            "Loading chain from disk: height {}, {} blocks",
            metadata.height,
            metadata.block_count
        );
        store.load_from_disk(&chain_db)?;
    } else {
        tracing::info!("No existing chain found, starting fresh");
    }

    // Local identity and committee
    let signer = Arc::new(load_signer(args.key_file.as_ref())?);
    tracing::info!("Local validator address: {}", signer.local_address());

    let validator_set = load_validator_set(args.validators_file.as_ref(), signer.local_address())?;
    tracing::info!(
        "Committee of {} validators, threshold {}",
        validator_set.len(),
        validator_set.threshold()
    );

    // Block production
    let producer = BlockProducer::new(
        store.clone(),
        BlockProducerConfig {
            block_time_ms: config.block_time_ms,
            verbose: args.verbose,
        },
    );
    let mut block_updates = producer.subscribe();
    let producer_handle = tokio::spawn(producer.run_async());

    // Periodic save to disk, driven by block updates
    let persist_db = chain_db.clone();
    let persist_store = store.clone();
    let save_interval = args.save_interval;
    let save_handle = tokio::spawn(async move {
        while let Ok(update) = block_updates.recv().await {
            if save_interval > 0 && update.number % save_interval == 0 && update.number > 0 {
                let metadata = ChainMetadata {
                    height: update.number,
                    block_count: persist_store.len() as u64,
                    last_save_ts: chrono::Utc::now().timestamp(),
                };
                if let Err(e) = persist_db.save_metadata(&metadata) {
                    tracing::error!("Failed to save metadata: {}", e);
                }
                if let Err(e) = persist_store.save_to_disk(&persist_db) {
                    tracing::error!("Failed to save chain: {}", e);
                } else {
                    tracing::info!("Saved chain state at height {}", update.number);
                }
            }
        }
    });

    // Gossip transport
    let transport = Arc::new(WsGossip::new());
    transport.start(&config.listen_addr, &config.peers).await?;

    // Checkpoint orchestration
    let settlement = Arc::new(ChainBackedSettlement::new(store.clone(), config.epoch_size));
    let manager = Arc::new(CheckpointManager::new(
        store.clone(),
        settlement,
        signer,
        transport.clone(),
        validator_set,
    ));
    manager.start()?;

    // Periodic checkpoint trigger
    let trigger = manager.clone();
    let epoch_size = config.epoch_size;
    let interval_secs = config.checkpoint_interval_secs;
    let checkpoint_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately; skip it so the chain covers
        // at least one epoch before the first attempt
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = trigger.start_new_checkpoint(epoch_size).await {
                tracing::error!("Checkpoint attempt failed: {}", e);
            }
        }
    });

    tracing::info!("Validator running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");

    manager.close();
    checkpoint_handle.abort();
    producer_handle.abort();
    save_handle.abort();

    // Save chain state before exit
    let metadata = ChainMetadata {
        height: store.height(),
        block_count: store.len() as u64,
        last_save_ts: chrono::Utc::now().timestamp(),
    };
    chain_db.save_metadata(&metadata)?;
    store.save_to_disk(&chain_db)?;
    tracing::info!("Final chain state saved at height {}", store.height());

    tracing::info!("Validator stopped");

    Ok(())
}
