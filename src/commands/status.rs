//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{DocumentStatus, Lifecycle};
use crate::store::QdrantStore;
use crate::tracking::TrackingStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// System-wide status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub qdrant_url: String,
    pub collection_name: String,
    pub embedding_model: String,
    pub qdrant_connected: bool,
    pub collection_exists: bool,
    pub qdrant_points: usize,
    pub tracked_documents: usize,
    pub known_bots: Vec<String>,
}

/// Get system status
pub async fn cmd_status(
    config: &Config,
    tracking: &TrackingStore,
    store: &QdrantStore,
) -> Result<StatusInfo> {
    info!("Getting status");

    let state = tracking.get().await?;
    let known_bots: BTreeSet<String> = state
        .values()
        .flat_map(|r| r.used_by_bots.iter().cloned())
        .collect();

    let (qdrant_connected, collection_exists, qdrant_points) = match store.collection_exists().await
    {
        Ok(true) => match store.get_stats().await {
            Ok(stats) => (true, true, stats.points_count),
            Err(e) => {
                tracing::debug!("Qdrant stats error: {:?}", e);
                (true, true, 0)
            }
        },
        Ok(false) => (true, false, 0),
        Err(e) => {
            tracing::debug!("Qdrant connection error: {:?}", e);
            (false, false, 0)
        }
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        qdrant_url: config.qdrant_url.clone(),
        collection_name: config.collection_name.clone(),
        embedding_model: config.embedding.model.clone(),
        qdrant_connected,
        collection_exists,
        qdrant_points,
        tracked_documents: state.len(),
        known_bots: known_bots.into_iter().collect(),
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 docent Status\n");
    println!("Configuration: {}", status.config_path);
    println!("\nQdrant:");
    println!("  URL: {}", status.qdrant_url);
    println!("  Collection: {}", status.collection_name);

    let connection_status = if status.qdrant_connected {
        if status.collection_exists {
            "✓ Connected"
        } else {
            "⚠ Connected (collection not created - run 'docent train' to create)"
        }
    } else {
        "✗ Not connected"
    };
    println!("  Status: {}", connection_status);
    println!("  Points: {}", status.qdrant_points);
    println!("\nEmbedding Model: {}", status.embedding_model);
    println!("\nTracking:");
    println!("  Documents: {}", status.tracked_documents);
    println!("  Bots: {}", status.known_bots.join(", "));
}

/// Training status of one document for one bot
pub async fn cmd_document_status(
    lifecycle: &Lifecycle,
    bot_id: &str,
    document_id: &str,
) -> Result<DocumentStatus> {
    lifecycle.document_status(bot_id, document_id).await
}

/// Print a document status to the console
pub fn print_document_status(bot_id: &str, document_id: &str, status: DocumentStatus) {
    let label = match status {
        DocumentStatus::NotTrained => "not trained",
        DocumentStatus::Stale => "stale (retraining required)",
        DocumentStatus::Current => "current",
    };
    println!("'{}' for bot '{}': {}", document_id, bot_id, label);
}

/// One tracked document, as listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub used_by_bots: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

/// List tracked documents, optionally restricted to one bot
pub async fn cmd_list_documents(
    tracking: &TrackingStore,
    bot_id: Option<&str>,
) -> Result<Vec<DocumentInfo>> {
    let state = tracking.get().await?;

    Ok(state
        .values()
        .filter(|record| bot_id.map(|b| record.uses_bot(b)).unwrap_or(true))
        .map(|record| DocumentInfo {
            document_id: record.document_id.clone(),
            filename: record.filename.clone(),
            mime_type: record.mime_type.clone(),
            used_by_bots: record.used_by_bots.clone(),
            trained_at: record.trained_at,
        })
        .collect())
}

/// Print the document list to the console
pub fn print_documents(documents: &[DocumentInfo]) {
    println!("\n📚 Trained Documents\n");

    if documents.is_empty() {
        println!("No trained documents. Use 'docent train' to add one.");
        return;
    }

    for doc in documents {
        println!("• {} [{}]", doc.filename, doc.document_id);
        if let Some(mime) = &doc.mime_type {
            println!("  Type: {}", mime);
        }
        println!("  Bots: {}", doc.used_by_bots.join(", "));
        println!("  Trained: {}", doc.trained_at.to_rfc3339());
        println!();
    }
}
