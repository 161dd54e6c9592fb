//! Persistence backends for the wallet store
//!
//! The store only needs a named-record key/value interface: read one record,
//! replace one record atomically. `FileBackend` keeps one JSON file per key;
//! `MemoryBackend` is the in-process fake used by tests.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the record stored under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the record under `key`; readers see either the old or the new
    /// value, never a partial write
    async fn save_atomic(&self, key: &str, value: &str) -> Result<()>;
}

/// One file per key under a base directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_atomic(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        let path = self.record_path(key);
        let tmp_path = path.with_extension("new");
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "Saved record");
        Ok(())
    }
}

/// In-memory backend; clones share the same records
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the store
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save_atomic(&self, key: &str, value: &str) -> Result<()> {
        self.insert_raw(key, value).await;
        Ok(())
    }
}
