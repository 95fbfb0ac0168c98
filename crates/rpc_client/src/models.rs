//! Wire models for the node RPC methods the indexer consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 1.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Subset of `getblockchaininfo` the indexer reads.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    /// Height of the chain tip.
    pub blocks: u64,
    #[serde(default, rename = "bestblockhash")]
    pub best_block_hash: Option<String>,
}

/// A block from `getblock` at verbosity 3, with fully decoded transactions
/// and per-input witness data.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub hash: String,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    #[serde(default)]
    pub tx: Vec<RpcTransaction>,
}

/// A decoded transaction within a verbosity-3 block.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<RpcTxIn>,
    #[serde(default)]
    pub vout: Vec<RpcTxOut>,
}

/// Transaction input. A coinbase input has no previous outpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTxIn {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txinwitness: Vec<String>,
}

impl RpcTxIn {
    /// The consumed outpoint, absent for coinbase inputs.
    pub fn outpoint(&self) -> Option<(&str, u32)> {
        match (&self.txid, self.vout) {
            (Some(txid), Some(vout)) => Some((txid.as_str(), vout)),
            _ => None,
        }
    }
}

/// Transaction output.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTxOut {
    #[serde(default)]
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RpcScriptPubKey,
}

/// Output script; only the raw hex is interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcScriptPubKey {
    pub hex: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_deserializes_verbosity_three() {
        let raw = r#"{
            "hash": "000000000000000000014a2b",
            "height": 809700,
            "previousblockhash": "000000000000000000009f1c",
            "tx": [{
                "txid": "aa11",
                "vin": [
                    {"coinbase": "0123", "txinwitness": []},
                    {"txid": "bb22", "vout": 1, "txinwitness": ["ab", "cd", "ef"]}
                ],
                "vout": [
                    {"value": 0.0, "scriptPubKey": {"hex": "6a01500144"}}
                ]
            }]
        }"#;

        let block: RpcBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(block.height, Some(809_700));
        assert_eq!(block.tx.len(), 1);
        assert_eq!(block.tx[0].vin[0].outpoint(), None);
        assert_eq!(block.tx[0].vin[1].outpoint(), Some(("bb22", 1)));
        assert_eq!(block.tx[0].vin[1].txinwitness.len(), 3);
    }
}
