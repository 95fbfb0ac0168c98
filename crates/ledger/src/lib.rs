//! # Pipe Token Ledger
//!
//! Derives a token ledger from the chain: per-block scanning, protocol
//! operation handling (deploy / mint / transfer / collection attach), running
//! balances over a namespaced key-value space, and the checkpoint state
//! machine with reorg and crash recovery.
//!
//! Block processing is strictly sequential. Transactions apply in declared
//! order and a block commits as a whole; the control keys act as a minimal
//! write-ahead log giving at-least-once processing per block.

pub mod address;
pub mod entities;
pub mod indexer;
pub mod keys;
pub mod projection;
pub mod store;

pub use entities::{Balance, CollectionAttachment, Deployment, TokenUtxo, Traits};
pub use indexer::{IndexOutcome, Indexer};
pub use projection::{audit_supply, MemoryProjection, ProjectionSync};
pub use store::BlockLedger;

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying key-value store failure
    #[error("Storage error: {0}")]
    Storage(#[from] pipe_persistence::Error),

    /// A stored record could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RPC retries exhausted; the cycle is deferred, not fatal
    #[error("Chain unavailable")]
    ChainUnavailable,

    /// Client construction failure
    #[error("RPC client error: {0}")]
    RpcClient(#[from] pipe_rpc_client::ClientError),
}
