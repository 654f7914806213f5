//! Lifecycle cleanup for trained documents
//!
//! Removes or retires vectors and tracking entries when a bot stops using a
//! document, a document is deleted, or a full purge is requested. All
//! removal paths soft-delete (flip the `active` flag) and leave physical
//! deletion to [`Lifecycle::sweep`], so a single failed request never
//! strands half-deleted state: an inactive vector is invisible to queries
//! either way.
//!
//! Vector deactivation always happens before the tracking write, and a
//! deactivation failure aborts the whole operation. Tracking therefore never
//! claims less than what the index still serves; the worst case after a
//! partial failure is a document that reads as `Stale` and can be retrained.

use crate::error::Result;
use crate::store::{FragmentFilter, VectorIndex};
use crate::tracking::TrackingStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of detaching a bot from a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The bot was unlinked (and the document cleaned up if it was the last)
    Detached,
    /// The bot was not linked to this document; nothing changed
    NotLinked,
    /// No tracking record exists for this document
    DocumentNotFound,
}

/// Result of removing a document everywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Training state of a document as seen by one bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Not tracked, or not linked to this bot
    NotTrained,
    /// Linked, but the index holds no active vectors for it
    Stale,
    /// Linked with active vectors
    Current,
}

/// Teardown operations over the tracking store and vector index
pub struct Lifecycle {
    tracking: Arc<TrackingStore>,
    index: Arc<dyn VectorIndex>,
}

impl Lifecycle {
    pub fn new(tracking: Arc<TrackingStore>, index: Arc<dyn VectorIndex>) -> Self {
        Self { tracking, index }
    }

    async fn retire_document_vectors(&self, document_id: &str) -> Result<usize> {
        let ids = self
            .index
            .list_ids(&FragmentFilter::active_document(document_id))
            .await?;
        if ids.is_empty() {
            debug!("No active vectors to retire for '{}'", document_id);
            return Ok(0);
        }
        let retired = self.index.deactivate(&ids).await?;
        info!("Retired {} vectors of document '{}'", retired, document_id);
        Ok(retired)
    }

    /// Unlink a bot from a document. Removing the last bot retires the
    /// document's vectors and drops its tracking record.
    pub async fn detach_bot(&self, document_id: &str, bot_id: &str) -> Result<DetachOutcome> {
        let state = self.tracking.get().await?;
        let Some(record) = state.get(document_id) else {
            return Ok(DetachOutcome::DocumentNotFound);
        };
        if !record.uses_bot(bot_id) {
            debug!(
                "Bot '{}' is not linked to document '{}'",
                bot_id, document_id
            );
            return Ok(DetachOutcome::NotLinked);
        }

        // Last bot leaving: retire vectors first so tracking never claims
        // less than the index still serves
        if record.used_by_bots.len() == 1 {
            self.retire_document_vectors(document_id).await?;
        }

        let document_id_owned = document_id.to_string();
        let bot = bot_id.to_string();
        self.tracking
            .mutate(move |state| {
                let now_empty = match state.get_mut(&document_id_owned) {
                    Some(rec) => {
                        rec.used_by_bots.retain(|b| b != &bot);
                        rec.used_by_bots.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    state.remove(&document_id_owned);
                }
            })
            .await?;

        info!("Bot '{}' detached from document '{}'", bot_id, document_id);
        Ok(DetachOutcome::Detached)
    }

    /// Unlink a bot from every document it uses, cleaning up documents left
    /// without bots. Returns the number of documents the bot was detached
    /// from.
    pub async fn detach_bot_everywhere(&self, bot_id: &str) -> Result<usize> {
        let state = self.tracking.get().await?;
        let linked: Vec<String> = state
            .iter()
            .filter(|(_, record)| record.uses_bot(bot_id))
            .map(|(document_id, _)| document_id.clone())
            .collect();

        if linked.is_empty() {
            debug!("Bot '{}' is not linked to any document", bot_id);
            return Ok(0);
        }

        let mut detached = 0;
        for document_id in &linked {
            match self.detach_bot(document_id, bot_id).await? {
                DetachOutcome::Detached => detached += 1,
                outcome => warn!(
                    "Unexpected outcome {:?} detaching '{}' from '{}'",
                    outcome, bot_id, document_id
                ),
            }
        }

        info!("Bot '{}' detached from {} documents", bot_id, detached);
        Ok(detached)
    }

    /// Remove a document for every bot: retire all of its vectors (active
    /// or not, any bot) and drop its tracking record.
    pub async fn remove_document(&self, document_id: &str) -> Result<RemoveOutcome> {
        let tracked = self.tracking.get().await?.contains_key(document_id);
        let ids = self
            .index
            .list_ids(&FragmentFilter::document(document_id))
            .await?;

        if !tracked && ids.is_empty() {
            return Ok(RemoveOutcome::NotFound);
        }

        if !ids.is_empty() {
            self.index.deactivate(&ids).await?;
        }

        if tracked {
            let document_id_owned = document_id.to_string();
            self.tracking
                .mutate(move |state| {
                    state.remove(&document_id_owned);
                })
                .await?;
        }

        info!(
            "Document '{}' removed ({} vectors retired)",
            document_id,
            ids.len()
        );
        Ok(RemoveOutcome::Removed)
    }

    /// Retire every vector in the index and clear the whole tracking state.
    /// Returns the number of tracked documents purged.
    pub async fn purge_all(&self) -> Result<usize> {
        warn!("Purging all training data");

        let active = self
            .index
            .list_ids(&FragmentFilter {
                document_ids: None,
                active: Some(true),
            })
            .await?;
        if !active.is_empty() {
            self.index.deactivate(&active).await?;
        }

        let purged = self.tracking.mutate(|state| {
            let count = state.len();
            state.clear();
            count
        })
        .await?;
        self.tracking.invalidate_cache().await;

        info!(
            "Purged {} documents ({} vectors retired)",
            purged,
            active.len()
        );
        Ok(purged)
    }

    /// Training status of one document as seen by one bot
    pub async fn document_status(
        &self,
        bot_id: &str,
        document_id: &str,
    ) -> Result<DocumentStatus> {
        let state = self.tracking.get().await?;
        let Some(record) = state.get(document_id) else {
            return Ok(DocumentStatus::NotTrained);
        };
        if !record.uses_bot(bot_id) {
            return Ok(DocumentStatus::NotTrained);
        }

        let active = self
            .index
            .count(&FragmentFilter::active_document(document_id))
            .await?;
        if active == 0 {
            Ok(DocumentStatus::Stale)
        } else {
            Ok(DocumentStatus::Current)
        }
    }

    /// Hard-delete retired vectors in batches. The reconciliation half of
    /// soft deletion; safe to run on a schedule.
    pub async fn sweep(&self) -> Result<usize> {
        let ids = self.index.list_ids(&FragmentFilter::inactive()).await?;
        if ids.is_empty() {
            debug!("Sweep found nothing to delete");
            return Ok(0);
        }

        for batch in ids.chunks(512) {
            self.index.delete(batch).await?;
        }

        info!("Sweep deleted {} retired vectors", ids.len());
        Ok(ids.len())
    }
}
