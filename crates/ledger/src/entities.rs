//! Stored ledger records.
//!
//! Amounts are u64 minor units everywhere in memory and decimal strings at
//! the storage boundary, handled by the `amount_string` serde module.

use pipe_core::amount::{clean_float, format_minor};
use serde::{Deserialize, Serialize};

/// u64 amounts encoded as decimal strings in stored JSON.
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Creation record of a (ticker, id) token.
///
/// Created once per pair; `rem` only decreases and the record is never
/// deleted except by reorg rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub tick: String,
    pub id: u64,
    pub dec: u8,
    #[serde(with = "amount_string")]
    pub max: u64,
    #[serde(with = "amount_string")]
    pub lim: u64,
    #[serde(with = "amount_string")]
    pub rem: u64,
    /// Defining transaction.
    pub tx: String,
    /// Output index of the OP_RETURN carrying the operation.
    pub vo: u32,
    /// Output index of the beneficiary.
    pub bvo: u32,
    pub baddr: String,
    #[serde(default)]
    pub col: Option<String>,
    #[serde(default)]
    pub colnum: Option<u64>,
    pub blck: u64,
    pub blckh: String,
}

/// An unspent output carrying an amount of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUtxo {
    pub addr: String,
    pub txid: String,
    pub vout: u32,
    pub tick: String,
    pub id: u64,
    #[serde(with = "amount_string")]
    pub amt: u64,
}

/// Collection traits: either a flat key/value pair list or an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Traits {
    Pairs(Vec<String>),
    Blob(String),
}

/// Snapshot recorded for one collection attachment, keyed by collection
/// address and sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAttachment {
    pub tick: String,
    pub id: u64,
    pub dec: u8,
    #[serde(with = "amount_string")]
    pub max: u64,
    #[serde(with = "amount_string")]
    pub lim: u64,
    #[serde(with = "amount_string")]
    pub rem: u64,
    pub tx: String,
    pub vo: u32,
    pub bvo: u32,
    pub baddr: String,
    pub col: String,
    pub colnum: u64,
    pub blck: u64,
    #[serde(default)]
    pub traits: Option<Traits>,
    #[serde(default)]
    pub mime: Option<String>,
    /// Concatenated push hex between the inline-content marker and the
    /// sequence-number marker.
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

impl CollectionAttachment {
    /// Deployment-shaped view used when mirroring an attachment into the
    /// projection.
    pub fn as_deployment(&self) -> Deployment {
        Deployment {
            tick: self.tick.clone(),
            id: self.id,
            dec: self.dec,
            max: self.max,
            lim: self.lim,
            rem: self.rem,
            tx: self.tx.clone(),
            vo: self.vo,
            bvo: self.bvo,
            baddr: self.baddr.clone(),
            col: Some(self.col.clone()),
            colnum: Some(self.colnum),
            blck: self.blck,
            blckh: String::new(),
        }
    }
}

/// Address balance as returned by the read helpers: the raw minor-unit
/// integer plus its cleaned decimal expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub ticker: String,
    pub id: u64,
    pub decimals: u8,
    pub amt_big: String,
    pub amt: String,
}

impl Balance {
    pub fn new(deployment: &Deployment, amount: u64) -> Self {
        let raw = format_minor(amount, deployment.dec);
        Self {
            ticker: deployment.tick.clone(),
            id: deployment.id,
            decimals: deployment.dec,
            amt_big: amount.to_string(),
            amt: clean_float(&raw).unwrap_or(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        Deployment {
            tick: "ab".to_string(),
            id: 1,
            dec: 2,
            max: 10_000,
            lim: 1_000,
            rem: 10_000,
            tx: "deadbeef".to_string(),
            vo: 1,
            bvo: 0,
            baddr: "bc1qexample".to_string(),
            col: None,
            colnum: None,
            blck: 810_500,
            blckh: "00".to_string(),
        }
    }

    #[test]
    fn test_amounts_stored_as_strings() {
        let json = serde_json::to_value(deployment()).unwrap();
        assert_eq!(json["max"], "10000");
        assert_eq!(json["lim"], "1000");
        assert_eq!(json["rem"], "10000");

        let back: Deployment = serde_json::from_value(json).unwrap();
        assert_eq!(back, deployment());
    }

    #[test]
    fn test_utxo_round_trip() {
        let utxo = TokenUtxo {
            addr: "bc1qexample".to_string(),
            txid: "deadbeef".to_string(),
            vout: 0,
            tick: "ab".to_string(),
            id: 1,
            amt: 50,
        };
        let json = serde_json::to_string(&utxo).unwrap();
        assert!(json.contains("\"amt\":\"50\""));
        let back: TokenUtxo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, utxo);
    }

    #[test]
    fn test_traits_untagged_forms() {
        let pairs: Traits = serde_json::from_str(r#"["color","red"]"#).unwrap();
        assert_eq!(pairs, Traits::Pairs(vec!["color".into(), "red".into()]));

        let blob: Traits = serde_json::from_str(r#""7b7d""#).unwrap();
        assert_eq!(blob, Traits::Blob("7b7d".to_string()));
    }

    #[test]
    fn test_balance_cleans_expansion() {
        let balance = Balance::new(&deployment(), 50);
        assert_eq!(balance.amt_big, "50");
        assert_eq!(balance.amt, "0.5");
    }
}
