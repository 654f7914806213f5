//! Document training state
//!
//! The tracking store is the authoritative record of which documents have
//! been trained, when, and for which bots. The whole state is one JSON
//! object persisted through a [`BlobStore`]; the unit of consistency is the
//! entire mapping, so every read-modify-write goes through a queued
//! single-writer transaction ([`TrackingStore::mutate`]) instead of racing
//! on stale reads.

mod blob;

pub use blob::*;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Authoritative record of one document's training state.
///
/// Serialized camelCase to match the persisted layout:
/// `{documentId, filename, mimeType, usedByBots, trainedAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub document_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub used_by_bots: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl TrackingRecord {
    /// Whether the stored training is at least as new as the source.
    ///
    /// A document with no known modification time is treated as always
    /// current once trained.
    pub fn is_current(&self, last_modified_at: Option<DateTime<Utc>>) -> bool {
        match last_modified_at {
            None => true,
            Some(modified) => self.trained_at >= modified,
        }
    }

    pub fn uses_bot(&self, bot_id: &str) -> bool {
        self.used_by_bots.iter().any(|b| b == bot_id)
    }
}

/// The full tracking mapping, keyed by document id
pub type TrackingState = BTreeMap<String, TrackingRecord>;

/// Validate that a state is a well-formed mapping before persisting it
fn validate_state(state: &TrackingState) -> Result<()> {
    for (key, record) in state {
        if key.is_empty() {
            return Err(Error::Validation(
                "Tracking state contains an empty document id".to_string(),
            ));
        }
        if record.document_id != *key {
            return Err(Error::Validation(format!(
                "Tracking record key '{}' does not match its document id '{}'",
                key, record.document_id
            )));
        }
        if record.filename.is_empty() {
            return Err(Error::Validation(format!(
                "Tracking record '{}' has an empty filename",
                key
            )));
        }
        if record.used_by_bots.iter().any(|b| b.is_empty()) {
            return Err(Error::Validation(format!(
                "Tracking record '{}' contains an empty bot id",
                key
            )));
        }
        let mut bots = record.used_by_bots.clone();
        bots.sort();
        bots.dedup();
        if bots.len() != record.used_by_bots.len() {
            return Err(Error::Validation(format!(
                "Tracking record '{}' contains duplicate bot ids",
                key
            )));
        }
    }
    Ok(())
}

/// Durable tracking store with a read-through cache and serialized writes
pub struct TrackingStore {
    blob: Arc<dyn BlobStore>,
    key: String,
    cache: RwLock<Option<TrackingState>>,
    writer: Mutex<()>,
}

impl TrackingStore {
    pub fn new(blob: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blob,
            key: key.into(),
            cache: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Current tracking state (cached after the first load)
    pub async fn get(&self) -> Result<TrackingState> {
        if let Some(state) = self.cache.read().await.as_ref() {
            return Ok(state.clone());
        }

        let state = self.load().await?;
        *self.cache.write().await = Some(state.clone());
        Ok(state)
    }

    async fn load(&self) -> Result<TrackingState> {
        if !self.blob.exists(&self.key).await? {
            debug!("Tracking blob {} does not exist yet", self.key);
            return Ok(TrackingState::new());
        }

        let bytes = self.blob.read(&self.key).await?;
        match serde_json::from_slice::<TrackingState>(&bytes) {
            Ok(state) => {
                debug!("Loaded tracking state with {} documents", state.len());
                Ok(state)
            }
            Err(e) => {
                // The stored blob stays untouched until the next save
                warn!("Tracking blob {} is malformed ({}); treating as empty", self.key, e);
                Ok(TrackingState::new())
            }
        }
    }

    /// Persist a full state, rejecting overlapping writers.
    ///
    /// A save racing another save (or a mutate) fails with
    /// [`Error::WriteConflict`] instead of interleaving; callers retry or
    /// use [`TrackingStore::mutate`], which queues.
    pub async fn save(&self, state: TrackingState) -> Result<()> {
        validate_state(&state)?;

        let _guard = self.writer.try_lock().map_err(|_| {
            Error::WriteConflict("another tracking write is in progress".to_string())
        })?;

        self.persist(state).await
    }

    /// Queued read-modify-write transaction over the whole state.
    ///
    /// Loads fresh state under the writer lock, applies `f`, validates and
    /// persists. Concurrent callers queue instead of clobbering each other.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TrackingState) -> R + Send,
        R: Send,
    {
        let _guard = self.writer.lock().await;

        let mut state = match self.cache.read().await.as_ref() {
            Some(state) => state.clone(),
            None => self.load().await?,
        };

        let out = f(&mut state);
        validate_state(&state)?;
        self.persist(state).await?;
        Ok(out)
    }

    async fn persist(&self, state: TrackingState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&state)?;
        self.blob.write(&self.key, &bytes).await?;
        *self.cache.write().await = Some(state);
        Ok(())
    }

    /// Drop the cache so the next read re-fetches from storage.
    ///
    /// Called after external or bulk changes to the persisted blob.
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
        debug!("Tracking cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(document_id: &str, bots: &[&str]) -> TrackingRecord {
        TrackingRecord {
            document_id: document_id.to_string(),
            filename: document_id.to_string(),
            mime_type: Some("application/pdf".to_string()),
            used_by_bots: bots.iter().map(|b| b.to_string()).collect(),
            trained_at: Utc::now(),
        }
    }

    fn store_with_memory() -> TrackingStore {
        TrackingStore::new(Arc::new(MemoryBlobStore::new()), "documentTracking.json")
    }

    #[tokio::test]
    async fn test_missing_blob_reads_as_empty_state() {
        let store = store_with_memory();
        let state = store.get().await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let tmp = TempDir::new().unwrap();
        let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path().to_path_buf()));

        let store = TrackingStore::new(blob.clone(), "documentTracking.json");
        let mut state = TrackingState::new();
        state.insert("handbook.pdf".to_string(), record("handbook.pdf", &["botA"]));
        store.save(state).await.unwrap();

        // A second store over the same blob sees the persisted state
        let reloaded = TrackingStore::new(blob, "documentTracking.json");
        let state = reloaded.get().await.unwrap();
        assert_eq!(state.len(), 1);
        assert!(state["handbook.pdf"].uses_bot("botA"));
    }

    #[tokio::test]
    async fn test_get_uses_cache_until_invalidated() {
        let blob = Arc::new(MemoryBlobStore::new());
        let store = TrackingStore::new(blob.clone(), "tracking.json");

        assert!(store.get().await.unwrap().is_empty());

        // Simulate an external writer updating the blob behind the cache
        let mut external = TrackingState::new();
        external.insert("doc".to_string(), record("doc", &["botA"]));
        blob.write(
            "tracking.json",
            &serde_json::to_vec_pretty(&external).unwrap(),
        )
        .await
        .unwrap();

        assert!(store.get().await.unwrap().is_empty());

        store.invalidate_cache().await;
        assert_eq!(store.get().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_blob_treated_as_empty_without_overwrite() {
        let blob = Arc::new(MemoryBlobStore::new());
        blob.write("tracking.json", b"[1, 2, 3]").await.unwrap();

        let store = TrackingStore::new(blob.clone(), "tracking.json");
        assert!(store.get().await.unwrap().is_empty());

        // Reading never rewrites the stored blob
        assert_eq!(blob.read("tracking.json").await.unwrap(), b"[1, 2, 3]");
    }

    #[tokio::test]
    async fn test_save_rejects_mismatched_keys() {
        let store = store_with_memory();
        let mut state = TrackingState::new();
        state.insert("wrong-key".to_string(), record("handbook.pdf", &["botA"]));

        let err = store.save(state).await.expect_err("should reject");
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_bots() {
        let store = store_with_memory();
        let mut state = TrackingState::new();
        state.insert("doc".to_string(), record("doc", &["botA", "botA"]));

        let err = store.save(state).await.expect_err("should reject");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_mutate_applies_and_persists() {
        let store = store_with_memory();

        let inserted = store
            .mutate(|state| {
                state.insert("doc".to_string(), record("doc", &["botA"]));
                state.len()
            })
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        store
            .mutate(|state| {
                if let Some(rec) = state.get_mut("doc") {
                    rec.used_by_bots.push("botB".to_string());
                }
            })
            .await
            .unwrap();

        let state = store.get().await.unwrap();
        assert_eq!(state["doc"].used_by_bots, vec!["botA", "botB"]);
    }

    #[tokio::test]
    async fn test_mutate_rejects_invalid_result_without_persisting() {
        let store = store_with_memory();
        store
            .mutate(|state| {
                state.insert("doc".to_string(), record("doc", &["botA"]));
            })
            .await
            .unwrap();

        let err = store
            .mutate(|state| {
                if let Some(rec) = state.get_mut("doc") {
                    rec.used_by_bots.push(String::new());
                }
            })
            .await
            .expect_err("empty bot id should be rejected");
        assert!(matches!(err, Error::Validation(_)));

        let state = store.get().await.unwrap();
        assert_eq!(state["doc"].used_by_bots, vec!["botA"]);
    }

    #[tokio::test]
    async fn test_concurrent_mutates_are_serialized() {
        let store = Arc::new(store_with_memory());
        store
            .mutate(|state| {
                state.insert("doc".to_string(), record("doc", &[]));
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mutate(move |state| {
                        if let Some(rec) = state.get_mut("doc") {
                            rec.used_by_bots.push(format!("bot{i}"));
                        }
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // No lost updates: every writer's bot survived
        let state = store.get().await.unwrap();
        assert_eq!(state["doc"].used_by_bots.len(), 8);
    }

    /// Blob store whose writes block until a gate opens, to hold the writer
    /// lock across a controlled window.
    struct GatedBlob {
        inner: MemoryBlobStore,
        gate: Arc<Mutex<()>>,
    }

    #[async_trait::async_trait]
    impl BlobStore for GatedBlob {
        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }
        async fn read(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.read(key).await
        }
        async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
            let _open = self.gate.lock().await;
            self.inner.write(key, bytes).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_save_is_rejected_with_conflict() {
        let gate = Arc::new(Mutex::new(()));
        let blob = Arc::new(GatedBlob {
            inner: MemoryBlobStore::new(),
            gate: gate.clone(),
        });
        let store = Arc::new(TrackingStore::new(blob, "tracking.json"));

        // Hold the gate so the spawned mutate blocks inside its blob write
        let held = gate.lock().await;

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .mutate(|state| {
                        state.insert("doc".to_string(), record("doc", &["botA"]));
                    })
                    .await
            })
        };

        // Give the mutate time to take the writer lock and reach the gate
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut state = TrackingState::new();
        state.insert("other".to_string(), record("other", &["botB"]));
        let err = store.save(state).await.expect_err("save should conflict");
        assert!(matches!(err, Error::WriteConflict(_)));

        drop(held);
        writer.await.unwrap().unwrap();

        let state = store.get().await.unwrap();
        assert!(state.contains_key("doc"));
    }
}
