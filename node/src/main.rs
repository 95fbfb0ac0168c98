//! Pipe indexer node binary.

mod scheduler;

use anyhow::Context;
use clap::Parser;
use pipe_config::{IndexerConfig, NetworkType, SchedulerConfig, StorageConfig};
use pipe_ledger::{Indexer, MemoryProjection};
use pipe_persistence::{KvStore, RocksDbStore};
use scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pipe-node", version, about = "Pipe token indexer node")]
struct Args {
    /// Bitcoin Core JSON-RPC endpoint
    #[arg(long, env = "BITCOIN_NODE_URL", default_value = "http://127.0.0.1:8332")]
    rpc_url: String,

    /// Network to index (mainnet, testnet, regtest)
    #[arg(long, default_value = "mainnet")]
    network: NetworkType,

    /// Ledger database directory
    #[arg(long, default_value = "./data/ledger")]
    db_path: PathBuf,

    /// Period of the block indexing task, in seconds
    #[arg(long, default_value_t = 60)]
    index_interval: u64,

    /// Period of the supply audit task, in seconds
    #[arg(long, default_value_t = 60)]
    audit_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting pipe-node on {}", args.network);

    let storage = StorageConfig {
        path: args.db_path.clone(),
        sync_writes: true,
    };
    let store: Arc<dyn KvStore> =
        Arc::new(RocksDbStore::open(&storage).context("opening ledger database")?);

    let config = IndexerConfig {
        network: args.network,
        rpc_url: args.rpc_url,
        ..IndexerConfig::default()
    };
    let schedule = SchedulerConfig {
        index_interval_secs: args.index_interval,
        audit_interval_secs: args.audit_interval,
    };

    let projection = Arc::new(MemoryProjection::new());
    let mut indexer = Indexer::new(config, store, projection.clone())?;
    indexer.init().await?;

    Scheduler::new(indexer, projection, schedule).run().await;
    Ok(())
}
