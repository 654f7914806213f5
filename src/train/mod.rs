//! Training orchestration
//!
//! Coordinates extraction, fragmentation, embedding, vector upsert and the
//! tracking update for one document/bot pair, deciding whether any work is
//! needed at all. Vectors are written before the tracking record, so a
//! failure mid-train never leaves tracking pointing at vectors that do not
//! exist; the reverse gap (vectors without tracking) is reconciled by the
//! lifecycle sweep.

use crate::config::Config;
use crate::document::{Document, MIME_GOOGLE_DOC, MIME_GOOGLE_SHEET};
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::extract::{DriveExtractor, ExtractorSet};
use crate::fragment::split_into_fragments;
use crate::store::{point_id, FragmentFilter, FragmentPayload, VectorIndex, VectorRecord};
use crate::tracking::{TrackingRecord, TrackingStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why a training request resulted in no training
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Extraction produced no usable text
    EmptyContent,
    /// The tracked MIME type cannot be retrained automatically
    UnsupportedMime(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::EmptyContent => write!(f, "empty-content"),
            SkipReason::UnsupportedMime(mime) => write!(f, "unsupported-mime: {}", mime),
        }
    }
}

/// Result of a training request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    /// The document was (re)embedded and stored
    Trained { fragments: usize },
    /// Already trained and the bot was already attached; nothing to do
    AlreadyCurrent,
    /// Already trained; the bot was attached without re-embedding
    BotAttached,
    /// No training happened, for the stated reason
    Skipped(SkipReason),
}

/// Coordinates the document-to-vector pipeline for one document at a time
pub struct Trainer {
    tracking: Arc<TrackingStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    extractors: ExtractorSet,
    drive: Option<Arc<DriveExtractor>>,
    max_tokens: usize,
    batch_size: usize,
    // Serializes concurrent trains of the same document
    document_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Trainer {
    pub fn new(
        config: &Config,
        tracking: Arc<TrackingStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        extractors: ExtractorSet,
    ) -> Self {
        Self {
            tracking,
            index,
            embedder,
            extractors,
            drive: None,
            max_tokens: config.fragment.max_tokens,
            batch_size: config.embedding.batch_size,
            document_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Attach a Drive client for metadata-driven retraining
    pub fn with_drive(mut self, drive: Arc<DriveExtractor>) -> Self {
        self.drive = Some(drive);
        self
    }

    fn document_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.document_locks.lock().unwrap();
        locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Train a document for a bot, re-embedding only when the source is
    /// newer than the stored training.
    pub async fn train_document(&self, doc: &Document, bot_id: &str) -> Result<TrainingOutcome> {
        if doc.document_id.trim().is_empty() {
            return Err(Error::Validation("document id is required".to_string()));
        }
        if bot_id.trim().is_empty() {
            return Err(Error::Validation("bot id is required".to_string()));
        }

        let lock = self.document_lock(&doc.document_id);
        let _guard = lock.lock().await;

        let state = self.tracking.get().await?;
        if let Some(record) = state.get(&doc.document_id) {
            if record.is_current(doc.last_modified_at) {
                if record.uses_bot(bot_id) {
                    debug!(
                        "Document '{}' already trained for bot '{}'",
                        doc.document_id, bot_id
                    );
                    return Ok(TrainingOutcome::AlreadyCurrent);
                }

                let document_id = doc.document_id.clone();
                let bot = bot_id.to_string();
                self.tracking
                    .mutate(move |state| {
                        if let Some(rec) = state.get_mut(&document_id) {
                            if !rec.uses_bot(&bot) {
                                rec.used_by_bots.push(bot);
                            }
                        }
                    })
                    .await?;

                info!(
                    "Attached bot '{}' to already-trained document '{}'",
                    bot_id, doc.document_id
                );
                return Ok(TrainingOutcome::BotAttached);
            }

            info!(
                "Document '{}' modified since last training; retraining",
                doc.document_id
            );
        }

        self.embed_and_store(doc, bot_id).await
    }

    async fn embed_and_store(&self, doc: &Document, bot_id: &str) -> Result<TrainingOutcome> {
        let text = self.extractors.extract(doc).await?;
        if text.trim().is_empty() {
            warn!(
                "Document '{}' has no extractable text; skipping training",
                doc.document_id
            );
            return Ok(TrainingOutcome::Skipped(SkipReason::EmptyContent));
        }

        let fragments = split_into_fragments(&text, self.max_tokens);
        debug!(
            "Document '{}' fragmented into {} blocks",
            doc.document_id,
            fragments.len()
        );

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let embeddings =
            embed_in_batches(self.embedder.as_ref(), texts, self.batch_size).await?;
        if embeddings.len() != fragments.len() {
            return Err(Error::Embedding(format!(
                "Embedding count mismatch: {} fragments, {} vectors",
                fragments.len(),
                embeddings.len()
            )));
        }

        let trained_at = Utc::now();
        let records: Vec<VectorRecord> = fragments
            .into_iter()
            .zip(embeddings)
            .map(|(fragment, vector)| VectorRecord {
                id: point_id(&doc.document_id, fragment.index),
                vector,
                payload: FragmentPayload::new(
                    doc.document_id.clone(),
                    doc.display_name.clone(),
                    doc.mime_type.clone(),
                    doc.source_kind,
                    fragment.index as i64,
                    fragment.heading,
                    fragment.text,
                    trained_at.to_rfc3339(),
                ),
            })
            .collect();
        let fragment_count = records.len();

        // Stale and fresh fragments must never both be retrievable: retire
        // the previous generation before the new one lands. Deterministic
        // ids make the upsert reclaim surviving indexes.
        let previous = self
            .index
            .list_ids(&FragmentFilter::active_document(&doc.document_id))
            .await?;
        if !previous.is_empty() {
            let retired = self.index.deactivate(&previous).await?;
            debug!(
                "Deactivated {} previous fragments of '{}'",
                retired, doc.document_id
            );
        }

        self.index.upsert(records).await?;

        let document_id = doc.document_id.clone();
        let filename = doc.display_name.clone();
        let mime_type = doc.mime_type.clone();
        let bot = bot_id.to_string();
        self.tracking
            .mutate(move |state| {
                let mut used_by_bots = state
                    .get(&document_id)
                    .map(|r| r.used_by_bots.clone())
                    .unwrap_or_default();
                if !used_by_bots.iter().any(|b| b == &bot) {
                    used_by_bots.push(bot);
                }

                state.insert(
                    document_id.clone(),
                    TrackingRecord {
                        document_id: document_id.clone(),
                        filename,
                        mime_type: Some(mime_type),
                        used_by_bots,
                        trained_at,
                    },
                );
            })
            .await?;

        info!(
            "Trained document '{}' for bot '{}' ({} fragments)",
            doc.document_id, bot_id, fragment_count
        );
        Ok(TrainingOutcome::Trained {
            fragments: fragment_count,
        })
    }

    /// Retrain a tracked Drive document if its source has changed since the
    /// last training. Non-Drive MIME types are skipped, not failed.
    pub async fn retrain_if_needed(
        &self,
        record: &TrackingRecord,
        bot_id: &str,
    ) -> Result<TrainingOutcome> {
        let mime = record.mime_type.as_deref().unwrap_or_default();
        if !matches!(mime, MIME_GOOGLE_DOC | MIME_GOOGLE_SHEET) {
            warn!(
                "MIME type '{}' is not supported for automatic retraining",
                mime
            );
            return Ok(TrainingOutcome::Skipped(SkipReason::UnsupportedMime(
                mime.to_string(),
            )));
        }

        let drive = self.drive.as_ref().ok_or_else(|| {
            Error::Config("Drive is not configured for this trainer".to_string())
        })?;

        let metadata = drive.file_metadata(&record.document_id).await?;
        let doc = Document::from_drive(
            &record.document_id,
            &metadata.name,
            mime,
            metadata.modified_time,
        );

        self.train_document(&doc, bot_id).await
    }
}
