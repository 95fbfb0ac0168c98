//! RocksDB storage implementation.

use crate::{Error, KvStore, Result};
use async_trait::async_trait;
use pipe_config::StorageConfig;
use rocksdb::{IteratorMode, Options, WriteOptions, DB};
use std::sync::Arc;
use tracing::info;

/// RocksDB-backed store. Writes go through the WAL and are synced before
/// `put` returns when `sync_writes` is set.
pub struct RocksDbStore {
    db: Arc<DB>,
    write_opts_sync: bool,
}

impl RocksDbStore {
    /// Opens (or creates) the database at the configured path.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        db_options.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&db_options, &config.path)
            .map_err(|e| Error::Database(format!("Failed to open RocksDB: {}", e)))?;

        info!("RocksDB store opened at: {:?}", config.path);

        Ok(Self {
            db: Arc::new(db),
            write_opts_sync: config.sync_writes,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.write_opts_sync);
        opts
    }
}

#[async_trait]
impl KvStore for RocksDbStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| Error::Database(format!("Get failed: {}", e)))?;

        value
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| Error::InvalidValue(e.to_string()))
            })
            .transpose()
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .put_opt(key.as_bytes(), value.as_bytes(), &self.write_options())
            .map_err(|e| Error::Database(format!("Put failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.db
            .delete_opt(key.as_bytes(), &self.write_options())
            .map_err(|e| Error::Database(format!("Delete failed: {}", e)))
    }

    async fn scan(&self) -> Result<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item.map_err(|e| Error::Database(format!("Scan failed: {}", e)))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| Error::InvalidValue(e.to_string()))?;
            let value = String::from_utf8(value.to_vec())
                .map_err(|e| Error::InvalidValue(e.to_string()))?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (RocksDbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            sync_writes: false,
        };
        (RocksDbStore::open(&config).expect("open"), dir)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (store, _dir) = temp_store();

        store.put("d_ab_1", "{}").await.unwrap();
        assert_eq!(store.get("d_ab_1").await.unwrap().as_deref(), Some("{}"));

        store.delete("d_ab_1").await.unwrap();
        assert_eq!(store.get("d_ab_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_is_ordered() {
        let (store, _dir) = temp_store();

        store.put("b", "2").await.unwrap();
        store.put("a", "1").await.unwrap();
        store.put("c", "3").await.unwrap();

        let entries = store.scan().await.unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
