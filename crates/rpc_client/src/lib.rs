//! Pipe RPC Client
//!
//! JSON-RPC 1.0 gateway to the Bitcoin node. Calls carry a short fixed
//! timeout and a bounded retry with exponential backoff; after the retries
//! are exhausted a call yields `None` rather than an error, so a caller
//! treats it as "chain unreachable this cycle" and defers to the next poll.

pub mod chain_client;
pub mod models;

pub use chain_client::ChainClient;
pub use models::{BlockchainInfo, RpcBlock, RpcScriptPubKey, RpcTransaction, RpcTxIn, RpcTxOut};

use thiserror::Error;

/// Result type for client construction
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while building the HTTP client; RPC calls themselves never
/// raise, they return `None` on exhaustion.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid RPC endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
