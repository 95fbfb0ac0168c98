//! Ledger key namespaces.
//!
//! All state lives in one ordered keyspace. Tickers are lowercased before
//! they enter a key so lookups are case-insensitive.

/// Last committed block height.
pub const LAST_BLOCK: &str = "b";
/// Hash of the last committed block.
pub const LAST_BLOCK_HASH: &str = "bh";
/// Highest height whose processing has started.
pub const BLOCK_CHECK: &str = "bchk";
/// Presence-only in-progress marker; set while a block is being applied.
pub const MARKER: &str = "mrk";
/// Presence-only pending-reorg flag.
pub const REORG: &str = "reorg";

/// Live token-bearing output.
pub fn utxo(txid: &str, vout: u32) -> String {
    format!("utxo_{}_{}", txid, vout)
}

/// Audit copy of a consumed token-bearing output.
pub fn spent(utxo_key: &str) -> String {
    format!("spent_{}", utxo_key)
}

/// Running balance of an address for one (ticker, id).
pub fn balance(address: &str, ticker: &str, id: u64) -> String {
    format!("a_{}_{}_{}", address, ticker.to_lowercase(), id)
}

/// Deployment record of a (ticker, id).
pub fn deployment(ticker: &str, id: u64) -> String {
    format!("d_{}_{}", ticker.to_lowercase(), id)
}

/// Back-reference from the beneficiary address to its deployment key.
pub fn deployment_by_address(address: &str, ticker: &str, id: u64) -> String {
    format!("da_{}_{}_{}", address, ticker.to_lowercase(), id)
}

/// Collection attachment record.
pub fn collection(address: &str, number: u64) -> String {
    format!("c_{}_{}", address, number)
}

/// Highest attachment number seen for a collection.
pub fn collection_max(address: &str) -> String {
    format!("c_max_{}", address)
}

/// Per-height index over the keys written at that height; rollback walks
/// these entries instead of scanning the whole keyspace.
pub fn block_writes(height: u64) -> String {
    format!("bw_{}", height)
}
