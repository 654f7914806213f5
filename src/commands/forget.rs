//! Forget commands - detach bots, remove documents, purge everything

use crate::error::Result;
use crate::lifecycle::{DetachOutcome, Lifecycle, RemoveOutcome};
use tracing::info;

/// Detach one bot from one document
pub async fn cmd_forget(
    lifecycle: &Lifecycle,
    document_id: &str,
    bot_id: &str,
) -> Result<DetachOutcome> {
    info!("Detaching bot '{}' from '{}'", bot_id, document_id);
    lifecycle.detach_bot(document_id, bot_id).await
}

/// Print a detach outcome to the console
pub fn print_detach_outcome(document_id: &str, bot_id: &str, outcome: DetachOutcome) {
    match outcome {
        DetachOutcome::Detached => {
            println!("✓ Bot '{}' forgot document '{}'", bot_id, document_id);
        }
        DetachOutcome::NotLinked => {
            println!(
                "Bot '{}' was not linked to document '{}'; nothing changed",
                bot_id, document_id
            );
        }
        DetachOutcome::DocumentNotFound => {
            println!("Document '{}' is not tracked", document_id);
        }
    }
}

/// Detach a bot from every document it uses
pub async fn cmd_forget_bot(lifecycle: &Lifecycle, bot_id: &str) -> Result<usize> {
    info!("Detaching bot '{}' from all documents", bot_id);
    lifecycle.detach_bot_everywhere(bot_id).await
}

/// Remove a document for every bot
pub async fn cmd_remove_document(
    lifecycle: &Lifecycle,
    document_id: &str,
) -> Result<RemoveOutcome> {
    info!("Removing document '{}' everywhere", document_id);
    lifecycle.remove_document(document_id).await
}

/// Print a remove outcome to the console
pub fn print_remove_outcome(document_id: &str, outcome: RemoveOutcome) {
    match outcome {
        RemoveOutcome::Removed => {
            println!("✓ Document '{}' removed for all bots", document_id);
        }
        RemoveOutcome::NotFound => {
            println!("Document '{}' was not found", document_id);
        }
    }
}

/// Purge every trained document and all vectors
pub async fn cmd_purge(lifecycle: &Lifecycle) -> Result<usize> {
    lifecycle.purge_all().await
}
