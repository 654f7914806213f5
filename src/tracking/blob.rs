//! Durable key-value blob persistence used by the tracking store

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

/// Narrow persistence interface: named blobs with an existence check.
///
/// The tracking store and the vector registry are the only consumers; each
/// persists a single JSON object under a fixed key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Filesystem-backed blob store
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(key)).await?)
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename keeps readers from observing a torn blob
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

/// In-memory blob store for tests
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.read().unwrap().contains_key(key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| {
                crate::error::Error::Tracking(format!("Blob not found: {}", key))
            })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_blob_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().to_path_buf());

        assert!(!store.exists("state.json").await.unwrap());

        store.write("state.json", b"{\"a\":1}").await.unwrap();
        assert!(store.exists("state.json").await.unwrap());
        assert_eq!(store.read("state.json").await.unwrap(), b"{\"a\":1}");

        store.write("state.json", b"{}").await.unwrap();
        assert_eq!(store.read("state.json").await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_fs_blob_creates_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().join("nested").join("deeper"));

        store.write("state.json", b"ok").await.unwrap();
        assert_eq!(store.read("state.json").await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_memory_blob_read_missing_fails() {
        let store = MemoryBlobStore::new();
        assert!(store.read("missing").await.is_err());
    }
}
