//! Whole-document persistence for ledger state

use crate::error::ReelError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load/save interface over one JSON-shaped document
#[async_trait]
pub trait DocumentStore<D>: Send + Sync {
    /// Load the document; `None` when nothing has been stored yet
    async fn load(&self) -> Result<Option<D>, ReelError>;

    /// Overwrite the stored document
    async fn save(&self, document: &D) -> Result<(), ReelError>;
}

/// Pretty-printed JSON file, replaced atomically on every save
pub struct JsonFileStore<D> {
    path: PathBuf,
    _document: PhantomData<fn() -> D>,
}

impl<D> JsonFileStore<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<D> DocumentStore<D> for JsonFileStore<D>
where
    D: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<D>, ReelError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, document: &D) -> Result<(), ReelError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| ReelError::Persistence(format!("{:?}: {}", self.path, e)))?;
        debug!("Saved {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

/// In-memory store used by tests and ephemeral runs
pub struct MemoryStore<D> {
    document: std::sync::Mutex<Option<D>>,
    saves: std::sync::atomic::AtomicUsize,
}

impl<D> MemoryStore<D> {
    pub fn new() -> Self {
        Self {
            document: std::sync::Mutex::new(None),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Store pre-seeded with a document
    pub fn with_document(document: D) -> Self {
        Self {
            document: std::sync::Mutex::new(Some(document)),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of saves performed
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl<D> Default for MemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D> DocumentStore<D> for MemoryStore<D>
where
    D: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<D>, ReelError> {
        self.document
            .lock()
            .map(|d| d.clone())
            .map_err(|e| ReelError::Persistence(e.to_string()))
    }

    async fn save(&self, document: &D) -> Result<(), ReelError> {
        let mut slot = self
            .document
            .lock()
            .map_err(|e| ReelError::Persistence(e.to_string()))?;
        *slot = Some(document.clone());
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_json_store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<BTreeMap<String, u64>> =
            JsonFileStore::new(dir.path().join("nested").join("stats.json"));

        assert!(store.load().await.unwrap().is_none());

        let mut document = BTreeMap::new();
        document.insert("youtube".to_string(), 3);
        store.save(&document).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(document));
        let siblings: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(siblings.len(), 1);
    }

    #[tokio::test]
    async fn test_json_store_reports_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store: JsonFileStore<BTreeMap<String, u64>> = JsonFileStore::new(&path);
        assert!(matches!(store.load().await, Err(ReelError::JsonError(_))));
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&1u32).await.unwrap();
        store.save(&2u32).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(2));
        assert_eq!(store.save_count(), 2);
    }
}
