//! Shared fixtures: raw script assembly and transaction builders.
#![allow(dead_code)]

use pipe_config::IndexerConfig;
use pipe_ledger::{Indexer, MemoryProjection};
use pipe_persistence::{KvStore, MemoryStore};
use pipe_rpc_client::{RpcScriptPubKey, RpcTransaction, RpcTxIn, RpcTxOut};
use std::sync::Arc;

pub const SYM_P: &[u8] = &[0x50];
pub const SYM_D: &[u8] = &[0x44];
pub const SYM_M: &[u8] = &[0x4d];
pub const SYM_T: &[u8] = &[0x54];

pub fn push(bytes: &[u8]) -> Vec<u8> {
    let mut piece = vec![bytes.len() as u8];
    piece.extend_from_slice(bytes);
    piece
}

pub fn op(byte: u8) -> Vec<u8> {
    vec![byte]
}

pub fn script_hex(parts: &[Vec<u8>]) -> String {
    hex::encode(parts.concat())
}

/// P2WPKH output script over a synthetic 20-byte hash.
pub fn p2wpkh(seed: u8) -> String {
    format!("0014{}", hex::encode([seed; 20]))
}

pub fn address_of(script: &str) -> String {
    pipe_ledger::address::from_script_hex(script, bitcoin::Network::Bitcoin).unwrap()
}

pub fn deploy_script(tick: &[u8], id: u8, output: u8, dec: u8, max: &str, lim: &str) -> String {
    script_hex(&[
        op(0x6a),
        push(SYM_P),
        push(SYM_D),
        push(tick),
        push(&[id]),
        push(&[output]),
        push(&[dec]),
        push(max.as_bytes()),
        push(lim.as_bytes()),
    ])
}

pub fn mint_script(tick: &[u8], id: u8, output: u8, amt: &str) -> String {
    script_hex(&[
        op(0x6a),
        push(SYM_P),
        push(SYM_M),
        push(tick),
        push(&[id]),
        push(&[output]),
        push(amt.as_bytes()),
    ])
}

pub fn transfer_script(quadruples: &[(&[u8], u8, u8, &str)]) -> String {
    let mut parts = vec![op(0x6a), push(SYM_P), push(SYM_T)];
    for (tick, id, output, amt) in quadruples {
        parts.push(push(tick));
        parts.push(push(&[*id]));
        parts.push(push(&[*output]));
        parts.push(push(amt.as_bytes()));
    }
    script_hex(&parts)
}

pub fn out(script: &str) -> RpcTxOut {
    RpcTxOut {
        value: 0.0001,
        script_pub_key: RpcScriptPubKey {
            hex: script.to_string(),
        },
    }
}

pub fn input(txid: &str, vout: u32) -> RpcTxIn {
    RpcTxIn {
        txid: Some(txid.to_string()),
        vout: Some(vout),
        coinbase: None,
        txinwitness: Vec::new(),
    }
}

pub fn witness_input(txid: &str, vout: u32, witness_script: &str) -> RpcTxIn {
    RpcTxIn {
        txid: Some(txid.to_string()),
        vout: Some(vout),
        coinbase: None,
        txinwitness: vec![
            "aa".repeat(64),
            witness_script.to_string(),
            "bb".repeat(33),
        ],
    }
}

pub fn tx(txid: &str, vin: Vec<RpcTxIn>, scripts: &[&str]) -> RpcTransaction {
    RpcTransaction {
        txid: txid.to_string(),
        vin,
        vout: scripts.iter().map(|s| out(s)).collect(),
    }
}

/// Indexer over in-memory storage with an unreachable RPC endpoint; tests
/// drive it through `process_block` directly.
pub fn indexer() -> (Indexer, Arc<MemoryProjection>) {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let projection = Arc::new(MemoryProjection::new());
    let config = IndexerConfig {
        rpc_url: "http://127.0.0.1:1".to_string(),
        ..IndexerConfig::default()
    };
    let indexer = Indexer::new(config, store, projection.clone()).unwrap();
    (indexer, projection)
}
