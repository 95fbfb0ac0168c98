//! The chain RPC gateway.

use crate::models::{BlockchainInfo, RpcBlock, RpcRequest, RpcResponse};
use crate::Result;
use pipe_config::{RPC_BACKOFF_BASE_MS, RPC_MAX_ATTEMPTS, RPC_TIMEOUT_SECS};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::error;

/// JSON-RPC client for the Bitcoin node.
///
/// Every call makes up to [`RPC_MAX_ATTEMPTS`] attempts with exponential
/// backoff and returns `None` once they are exhausted; callers must treat
/// that as a deferred cycle, not a fatal error.
pub struct ChainClient {
    endpoint: String,
    http_client: Client,
}

impl ChainClient {
    /// Creates a new client for the given endpoint.
    pub fn new(endpoint: &str) -> Result<Self> {
        if reqwest::Url::parse(endpoint).is_err() {
            return Err(crate::ClientError::InvalidEndpoint(endpoint.to_string()));
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            http_client,
        })
    }

    /// Issues one JSON-RPC 1.0 call with bounded retry.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Option<Value> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: format!("rpc_call_{}", now_millis()),
            method: method.to_string(),
            params,
        };

        for attempt in 0..RPC_MAX_ATTEMPTS {
            match self.send(&request).await {
                Ok(result) => return Some(result),
                Err(message) => {
                    error!(
                        "RPC request {} {:?} failed with error: {}",
                        method, request.params, message
                    );
                    if attempt == RPC_MAX_ATTEMPTS - 1 {
                        error!("RPC request attempts exhausted");
                        return None;
                    }
                    let delay = 2u64.pow(attempt) * RPC_BACKOFF_BASE_MS;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        None
    }

    async fn send(&self, request: &RpcRequest) -> std::result::Result<Value, String> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {}", e))?;

        let status = response.status();
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid response ({}): {}", status, e))?;

        if let Some(error) = body.error {
            return Err(format!("RPC error {}: {}", error.code, error.message));
        }
        if !status.is_success() {
            return Err(format!("HTTP status {}", status));
        }

        Ok(body.result)
    }

    /// `getblockchaininfo`; `None` when the chain is unreachable.
    pub async fn get_blockchain_info(&self) -> Option<BlockchainInfo> {
        let result = self.call("getblockchaininfo", vec![]).await?;
        decode("getblockchaininfo", result)
    }

    /// Current chain tip height; 0 when the chain is unreachable.
    pub async fn get_chain_height(&self) -> u64 {
        self.get_blockchain_info()
            .await
            .map(|info| info.blocks)
            .unwrap_or(0)
    }

    /// `getblockhash` for a height, whitespace-trimmed.
    pub async fn get_block_hash(&self, height: u64) -> Option<String> {
        let result = self.call("getblockhash", vec![json!(height)]).await?;
        let hash: String = decode("getblockhash", result)?;
        Some(hash.trim().to_string())
    }

    /// `getblock` at verbosity 3 (decoded transactions plus witness data).
    pub async fn get_block(&self, hash: &str) -> Option<RpcBlock> {
        let result = self.call("getblock", vec![json!(hash), json!(3)]).await?;
        decode("getblock", result)
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            error!("Failed to decode {} result: {}", method, e);
            None
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
