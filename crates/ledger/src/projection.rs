//! Best-effort mirror of deployments and UTXOs into a queryable store.
//!
//! The projection is eventually consistent with the ledger and never
//! transactionally linked to it: the ledger invokes it synchronously from its
//! typed write points, logs failures, and keeps going. A periodic audit
//! cross-checks remaining supply and self-heals drift.

use crate::entities::{Deployment, TokenUtxo};
use crate::keys;
use crate::store::BlockLedger;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{error, warn};

/// Mime types the downstream explorer can render. Advisory only; an
/// attachment with any other mime is still recorded.
pub const SUPPORTED_MIMES: &[&str] = &[
    "application/json",
    "application/pdf",
    "application/pgp-signature",
    "application/protobuf",
    "application/yaml",
    "audio/flac",
    "audio/mpeg",
    "audio/wav",
    "image/apng",
    "image/avif",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/webp",
    "model/gltf+json",
    "model/gltf-binary",
    "model/stl",
    "text/css",
    "text/html",
    "text/html;charset=utf-8",
    "text/javascript",
    "text/markdown",
    "text/markdown;charset=utf-8",
    "text/plain",
    "text/plain;charset=utf-8",
    "video/mp4",
    "video/webm",
];

/// External projection consumed by the ledger's write points.
#[async_trait]
pub trait ProjectionSync: Send + Sync {
    async fn upsert_deployment(&self, deployment: &Deployment) -> Result<()>;

    async fn upsert_utxo(&self, utxo: &TokenUtxo, block: u64) -> Result<()>;

    async fn delete_utxo(&self, txid: &str, vout: u32) -> Result<()>;

    /// Drops every projected record originating from one block height.
    async fn delete_all_by_block(&self, height: u64) -> Result<()>;

    async fn read_all_deployments(&self) -> Result<Vec<Deployment>>;
}

/// In-memory projection used by the node default and by tests.
#[derive(Default)]
pub struct MemoryProjection {
    deployments: RwLock<HashMap<(String, u64), Deployment>>,
    utxos: RwLock<HashMap<(String, u32), (TokenUtxo, u64)>>,
}

impl MemoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployment(&self, ticker: &str, id: u64) -> Option<Deployment> {
        self.deployments
            .read()
            .get(&(ticker.to_lowercase(), id))
            .cloned()
    }

    pub fn utxo_count(&self) -> usize {
        self.utxos.read().len()
    }
}

#[async_trait]
impl ProjectionSync for MemoryProjection {
    async fn upsert_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.deployments.write().insert(
            (deployment.tick.to_lowercase(), deployment.id),
            deployment.clone(),
        );
        Ok(())
    }

    async fn upsert_utxo(&self, utxo: &TokenUtxo, block: u64) -> Result<()> {
        self.utxos
            .write()
            .insert((utxo.txid.clone(), utxo.vout), (utxo.clone(), block));
        Ok(())
    }

    async fn delete_utxo(&self, txid: &str, vout: u32) -> Result<()> {
        self.utxos.write().remove(&(txid.to_string(), vout));
        Ok(())
    }

    async fn delete_all_by_block(&self, height: u64) -> Result<()> {
        self.utxos.write().retain(|_, (_, block)| *block != height);
        self.deployments
            .write()
            .retain(|_, deployment| deployment.blck != height);
        Ok(())
    }

    async fn read_all_deployments(&self) -> Result<Vec<Deployment>> {
        Ok(self.deployments.read().values().cloned().collect())
    }
}

/// Cross-checks every projected deployment's remaining supply against the
/// ledger record and overwrites the projection where they disagree. Ledger
/// deployments missing from the projection entirely are re-projected. The
/// ledger is the source of truth.
pub async fn audit_supply(ledger: &BlockLedger, projection: &dyn ProjectionSync) -> Result<()> {
    let projected = projection.read_all_deployments().await?;

    let known: std::collections::HashSet<(String, u64)> = projected
        .iter()
        .map(|record| (record.tick.to_lowercase(), record.id))
        .collect();
    for truth in ledger.deployments().await? {
        if !known.contains(&(truth.tick.to_lowercase(), truth.id)) {
            warn!("Token {}:{} missing from projection", truth.tick, truth.id);
            if let Err(e) = projection.upsert_deployment(&truth).await {
                warn!("Projection insert failed for {}:{}: {}", truth.tick, truth.id, e);
            }
        }
    }

    for record in projected {
        let key = keys::deployment(&record.tick, record.id);
        match ledger.get_json::<Deployment>(&key).await {
            Ok(Some(truth)) => {
                if truth.rem != record.rem {
                    warn!(
                        "Mismatch on remaining amount for token {}:{}",
                        record.tick, record.id
                    );
                    if let Err(e) = projection.upsert_deployment(&truth).await {
                        warn!("Projection heal failed for {}: {}", key, e);
                    }
                }
            }
            Ok(None) => {
                error!("Token {}:{} not found on ledger", record.tick, record.id);
            }
            Err(e) => {
                error!("Audit read failed for {}: {}", key, e);
            }
        }
    }

    Ok(())
}
