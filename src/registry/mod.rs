//! Vector registry for traceability
//!
//! Records the vector ids stored for each document (active and retired) so
//! operators can audit or hard-delete from the console. The registry never
//! participates in training decisions and is kept in its own blob, separate
//! from the tracking state.

use crate::error::Result;
use crate::store::{FragmentFilter, VectorIndex};
use crate::tracking::BlobStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Vector ids recorded for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub vector_ids: Vec<String>,
    pub filename: String,
}

/// The whole registry, keyed by document id
pub type Registry = BTreeMap<String, RegistryEntry>;

/// Durable ledger of vector ids per document
pub struct VectorRegistry {
    blob: Arc<dyn BlobStore>,
    key: String,
    index: Arc<dyn VectorIndex>,
    cache: RwLock<Option<Registry>>,
}

impl VectorRegistry {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        key: impl Into<String>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            blob,
            key: key.into(),
            index,
            cache: RwLock::new(None),
        }
    }

    /// Current registry contents (cached after the first load)
    pub async fn load(&self) -> Result<Registry> {
        if let Some(registry) = self.cache.read().await.as_ref() {
            return Ok(registry.clone());
        }

        let registry = if self.blob.exists(&self.key).await? {
            let bytes = self.blob.read(&self.key).await?;
            match serde_json::from_slice::<Registry>(&bytes) {
                Ok(registry) => registry,
                Err(e) => {
                    warn!("Registry blob {} is malformed ({}); starting fresh", self.key, e);
                    Registry::new()
                }
            }
        } else {
            Registry::new()
        };

        *self.cache.write().await = Some(registry.clone());
        Ok(registry)
    }

    async fn save(&self, registry: Registry) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&registry)?;
        self.blob.write(&self.key, &bytes).await?;
        *self.cache.write().await = Some(registry);
        Ok(())
    }

    /// Drop the cache so the next load re-fetches from storage
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
    }

    /// Record the vectors actually active in the index for a document.
    ///
    /// The index is the source of truth; whatever the caller believes it
    /// wrote is ignored in favor of what is really stored.
    pub async fn register(&self, document_id: &str, filename: &str) -> Result<usize> {
        let ids = self
            .index
            .list_ids(&FragmentFilter::active_document(document_id))
            .await?;
        let vector_ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let recorded = vector_ids.len();

        let mut registry = self.load().await?;
        registry.insert(
            document_id.to_string(),
            RegistryEntry {
                vector_ids,
                filename: filename.to_string(),
            },
        );
        self.save(registry).await?;

        debug!(
            "Registered {} vectors for document '{}'",
            recorded, document_id
        );
        Ok(recorded)
    }

    /// Recorded vector ids for a document, if any
    pub async fn vector_ids(&self, document_id: &str) -> Result<Option<Vec<String>>> {
        let registry = self.load().await?;
        Ok(registry.get(document_id).map(|e| e.vector_ids.clone()))
    }

    /// Recorded filename for a document, if any
    pub async fn filename(&self, document_id: &str) -> Result<Option<String>> {
        let registry = self.load().await?;
        Ok(registry.get(document_id).map(|e| e.filename.clone()))
    }

    /// Rebuild the whole registry from the index, regardless of active
    /// state. Returns the number of documents recorded.
    pub async fn rebuild(&self) -> Result<usize> {
        let points = self.index.list_payloads(&FragmentFilter::default()).await?;

        let mut registry = Registry::new();
        for (id, payload) in points {
            if payload.document_id.is_empty() {
                continue;
            }
            let entry = registry
                .entry(payload.document_id.clone())
                .or_insert_with(|| RegistryEntry {
                    vector_ids: Vec::new(),
                    filename: payload.display_name.clone(),
                });
            entry.vector_ids.push(id.to_string());
        }

        let documents = registry.len();
        self.save(registry).await?;

        info!("Rebuilt vector registry with {} documents", documents);
        Ok(documents)
    }
}
