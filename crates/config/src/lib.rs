//! Pipe Indexer Configuration Module
//!
//! This module provides protocol constants and configuration types shared by
//! the indexer crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// First block at which the protocol can appear; indexing resumes here when
/// no checkpoint has been committed yet.
pub const GENESIS_HEIGHT: u64 = 809_607;

/// Blocks below this height accept the legacy amount encoding (raw hex push
/// or hex-decoded text); blocks at or above it require hex-decoded text.
pub const LEGACY_BLOCK_END: u64 = 810_000;

/// Upper bound for every declared amount in minor units.
pub const TOTAL_LIMIT: u64 = u64::MAX;

/// Largest accepted token id.
pub const MAX_TOKEN_ID: u64 = 999_999;

/// Largest accepted collection sequence number.
pub const MAX_COLLECTION_NUMBER: u64 = 999_999_999;

/// Largest accepted decimal count for a deployment.
pub const MAX_DECIMALS: u64 = 8;

/// Number of recent heights unwound when a reorg is detected.
pub const REORG_WINDOW: u64 = 8;

/// Pause between blocks during catch-up, in milliseconds.
pub const CATCHUP_PAUSE_MS: u64 = 1_000;

/// Per-call RPC timeout in seconds.
pub const RPC_TIMEOUT_SECS: u64 = 5;

/// Number of RPC attempts before a call is abandoned.
pub const RPC_MAX_ATTEMPTS: u32 = 5;

/// Base delay for the exponential RPC backoff, in milliseconds.
pub const RPC_BACKOFF_BASE_MS: u64 = 1_000;

/// Bitcoin network the indexer runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetworkType {
    #[default]
    MainNet,
    TestNet,
    Regtest,
}

impl NetworkType {
    /// Maps to the `bitcoin` crate network used for address derivation.
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            NetworkType::MainNet => bitcoin::Network::Bitcoin,
            NetworkType::TestNet => bitcoin::Network::Testnet,
            NetworkType::Regtest => bitcoin::Network::Regtest,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::MainNet => write!(f, "mainnet"),
            NetworkType::TestNet => write!(f, "testnet"),
            NetworkType::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkType::MainNet),
            "testnet" | "test" => Ok(NetworkType::TestNet),
            "regtest" => Ok(NetworkType::Regtest),
            _ => Err(format!("Unknown network type: {}", s)),
        }
    }
}

/// Indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub network: NetworkType,
    /// Bitcoin Core JSON-RPC endpoint.
    pub rpc_url: String,
    /// Height to start indexing from when no checkpoint exists.
    pub genesis_height: u64,
    /// Cutoff for the legacy amount encoding.
    pub legacy_block_end: u64,
    /// Rollback window on reorg detection.
    pub reorg_window: u64,
    /// Pause between blocks during catch-up, in milliseconds.
    pub catchup_pause_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::MainNet,
            rpc_url: "http://127.0.0.1:8332".to_string(),
            genesis_height: GENESIS_HEIGHT,
            legacy_block_end: LEGACY_BLOCK_END,
            reorg_window: REORG_WINDOW,
            catchup_pause_ms: CATCHUP_PAUSE_MS,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the RocksDB database directory.
    pub path: PathBuf,
    /// Whether puts must be flushed to disk before returning.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ledger"),
            sync_writes: true,
        }
    }
}

/// Scheduler configuration for the periodic tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Period of the block indexing task, in seconds.
    pub index_interval_secs: u64,
    /// Period of the supply audit task, in seconds.
    pub audit_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            index_interval_secs: 60,
            audit_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_type_from_str() {
        assert_eq!("mainnet".parse::<NetworkType>(), Ok(NetworkType::MainNet));
        assert_eq!("test".parse::<NetworkType>(), Ok(NetworkType::TestNet));
        assert!("foonet".parse::<NetworkType>().is_err());
    }

    #[test]
    fn test_indexer_config_default() {
        let config = IndexerConfig::default();
        assert_eq!(config.genesis_height, GENESIS_HEIGHT);
        assert_eq!(config.legacy_block_end, LEGACY_BLOCK_END);
        assert_eq!(config.reorg_window, 8);
    }

    #[test]
    fn test_network_mapping() {
        assert_eq!(NetworkType::MainNet.to_bitcoin(), bitcoin::Network::Bitcoin);
        assert_eq!(NetworkType::Regtest.to_bitcoin(), bitcoin::Network::Regtest);
    }
}
