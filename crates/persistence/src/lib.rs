//! # Pipe Persistence Layer
//!
//! Ordered, durable key-value storage for the token ledger.
//!
//! The ledger model is a flat namespace of string keys over one ordered
//! keyspace, so the interface is intentionally small: get/put/delete plus a
//! full forward scan. Puts are durable before they return. Two backends are
//! provided: RocksDB for production and an in-memory ordered map for tests.

pub mod memory;
pub mod rocksdb_store;

pub use memory::MemoryStore;
pub use rocksdb_store::RocksDbStore;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Persistence-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered key-value store interface used by the ledger.
///
/// Implementations must iterate the keyspace in forward key order and must
/// not return from `put` before the write is durable.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Gets a value by key; `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a key-value pair durably.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Full forward iteration over the keyspace.
    async fn scan(&self) -> Result<Vec<(String, String)>>;

    /// Checks key presence without reading the value.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
