//! Block-tagged ledger adapter over the key-value store.
//!
//! Every non-control write is wrapped in an envelope carrying the height it
//! originated from, and the key is appended to a per-height write index so a
//! reorg rollback can delete exactly the writes of an unwound range without
//! scanning the keyspace. Control keys (checkpoints, markers) are stored
//! raw.
//!
//! Typed write points mirror their records into the projection; a projection
//! failure is logged and never blocks ledger progress.

use crate::entities::{CollectionAttachment, Deployment, TokenUtxo};
use crate::keys;
use crate::projection::ProjectionSync;
use crate::Result;
use pipe_persistence::KvStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Serialize, Deserialize)]
struct Envelope {
    block: u64,
    value: String,
}

/// Single-writer ledger view bound to the height currently being processed.
#[derive(Clone)]
pub struct BlockLedger {
    store: Arc<dyn KvStore>,
    projection: Arc<dyn ProjectionSync>,
    height: u64,
}

impl BlockLedger {
    pub fn new(store: Arc<dyn KvStore>, projection: Arc<dyn ProjectionSync>) -> Self {
        Self {
            store,
            projection,
            height: 0,
        }
    }

    /// Sets the height every subsequent write is tagged with.
    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Reads the value of an enveloped key.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).await? {
            Some(raw) => {
                let envelope: Envelope = serde_json::from_str(&raw)?;
                Ok(Some(envelope.value))
            }
            None => Ok(None),
        }
    }

    /// Reads and decodes a JSON record stored under an enveloped key.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Reads a decimal amount stored under an enveloped key; an absent or
    /// unparsable value reads as zero.
    pub async fn get_amount(&self, key: &str) -> Result<u64> {
        Ok(self
            .get(key)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    /// Every deployment record on the ledger, in key order.
    pub async fn deployments(&self) -> Result<Vec<Deployment>> {
        let mut records = Vec::new();
        for (key, raw) in self.store.scan().await? {
            if !key.starts_with("d_") {
                continue;
            }
            let envelope: Envelope = serde_json::from_str(&raw)?;
            records.push(serde_json::from_str(&envelope.value)?);
        }
        Ok(records)
    }

    /// Writes an enveloped value tagged with the current height and records
    /// the key in the height's write index.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.index_write(key).await?;
        let envelope = Envelope {
            block: self.height,
            value: value.to_string(),
        };
        self.store
            .put(key, &serde_json::to_string(&envelope)?)
            .await?;
        Ok(())
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put(key, &serde_json::to_string(value)?).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains(key).await?)
    }

    /// Stores a deployment and mirrors it into the projection.
    pub async fn put_deployment(&self, key: &str, deployment: &Deployment) -> Result<()> {
        self.put_json(key, deployment).await?;
        if let Err(e) = self.projection.upsert_deployment(deployment).await {
            warn!("Projection upsert failed for {}: {}", key, e);
        }
        Ok(())
    }

    /// Stores a live token-bearing output and mirrors it into the
    /// projection.
    pub async fn put_utxo(&self, utxo: &TokenUtxo) -> Result<()> {
        let key = keys::utxo(&utxo.txid, utxo.vout);
        self.put_json(&key, utxo).await?;
        if let Err(e) = self.projection.upsert_utxo(utxo, self.height).await {
            warn!("Projection upsert failed for {}: {}", key, e);
        }
        Ok(())
    }

    /// Moves a consumed output to its audit record: writes the spent copy,
    /// deletes the live key, and drops the projected UTXO.
    pub async fn put_spent(&self, utxo: &TokenUtxo) -> Result<()> {
        let live_key = keys::utxo(&utxo.txid, utxo.vout);
        self.put_json(&keys::spent(&live_key), utxo).await?;
        self.delete(&live_key).await?;
        if let Err(e) = self.projection.delete_utxo(&utxo.txid, utxo.vout).await {
            warn!("Projection delete failed for {}: {}", live_key, e);
        }
        Ok(())
    }

    /// Stores a collection attachment and mirrors its deployment-shaped view
    /// into the projection.
    pub async fn put_attachment(&self, key: &str, attachment: &CollectionAttachment) -> Result<()> {
        self.put_json(key, attachment).await?;
        if let Err(e) = self
            .projection
            .upsert_deployment(&attachment.as_deployment())
            .await
        {
            warn!("Projection upsert failed for {}: {}", key, e);
        }
        Ok(())
    }

    /// Raw control-key access; no envelope, no write index.
    pub async fn control_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.get(key).await?)
    }

    pub async fn control_put(&self, key: &str, value: &str) -> Result<()> {
        self.store.put(key, value).await?;
        Ok(())
    }

    pub async fn control_delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        Ok(())
    }

    pub async fn control_contains(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains(key).await?)
    }

    /// Deletes every write tagged with the given height, via the height's
    /// write index, then drops the index entry and the projected records.
    pub async fn remove_all(&self, height: u64) -> Result<()> {
        let index_key = keys::block_writes(height);

        if let Some(raw) = self.store.get(&index_key).await? {
            let written: Vec<String> = serde_json::from_str(&raw)?;
            for key in written {
                if let Some(stored) = self.store.get(&key).await? {
                    match serde_json::from_str::<Envelope>(&stored) {
                        Ok(envelope) if envelope.block == height => {
                            self.store.delete(&key).await?;
                        }
                        // Overwritten at a later height or unparsable; leave it.
                        _ => {}
                    }
                }
            }
            self.store.delete(&index_key).await?;
        }

        if let Err(e) = self.projection.delete_all_by_block(height).await {
            warn!("Projection rollback failed for block {}: {}", height, e);
        }
        Ok(())
    }

    async fn index_write(&self, key: &str) -> Result<()> {
        let index_key = keys::block_writes(self.height);
        let mut written: Vec<String> = match self.store.get(&index_key).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        if !written.iter().any(|k| k == key) {
            written.push(key.to_string());
            self.store
                .put(&index_key, &serde_json::to_string(&written)?)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::MemoryProjection;
    use pipe_persistence::MemoryStore;

    fn ledger_at(height: u64) -> BlockLedger {
        let mut ledger = BlockLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryProjection::new()),
        );
        ledger.set_height(height);
        ledger
    }

    #[tokio::test]
    async fn test_envelope_round_trip() {
        let ledger = ledger_at(810_000);
        ledger.put("a_x_ab_1", "50").await.unwrap();
        assert_eq!(ledger.get("a_x_ab_1").await.unwrap().as_deref(), Some("50"));
        assert_eq!(ledger.get_amount("a_x_ab_1").await.unwrap(), 50);
        assert_eq!(ledger.get_amount("a_missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_control_keys_are_raw() {
        let ledger = ledger_at(810_000);
        ledger.control_put(keys::MARKER, "").await.unwrap();
        assert!(ledger.control_contains(keys::MARKER).await.unwrap());
        ledger.control_delete(keys::MARKER).await.unwrap();
        assert!(!ledger.control_contains(keys::MARKER).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_all_deletes_only_tagged_height() {
        let mut ledger = ledger_at(100);
        ledger.put("a_x_ab_1", "10").await.unwrap();
        ledger.put("a_y_ab_1", "20").await.unwrap();

        // Overwrite one key at a later height.
        ledger.set_height(101);
        ledger.put("a_x_ab_1", "30").await.unwrap();

        ledger.remove_all(100).await.unwrap();
        assert_eq!(ledger.get_amount("a_x_ab_1").await.unwrap(), 30);
        assert_eq!(ledger.get("a_y_ab_1").await.unwrap(), None);

        ledger.remove_all(101).await.unwrap();
        assert_eq!(ledger.get("a_x_ab_1").await.unwrap(), None);
    }
}
