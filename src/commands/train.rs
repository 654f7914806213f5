//! Train command - teach a bot a blob or Drive document

use crate::document::Document;
use crate::error::Result;
use crate::extract::DriveExtractor;
use crate::progress::spinner;
use crate::registry::VectorRegistry;
use crate::train::{Trainer, TrainingOutcome};
use tracing::info;

/// Train a blob-stored file (PDF, text, Markdown) for a bot
pub async fn cmd_train_file(
    trainer: &Trainer,
    registry: &VectorRegistry,
    filename: &str,
    bot_id: &str,
) -> Result<TrainingOutcome> {
    info!("Training file '{}' for bot '{}'", filename, bot_id);

    let doc = Document::from_blob(filename);
    let bar = spinner(format!("Training '{}'...", filename));
    let outcome = trainer.train_document(&doc, bot_id).await;
    bar.finish_and_clear();

    let outcome = outcome?;
    if matches!(outcome, TrainingOutcome::Trained { .. }) {
        registry.register(&doc.document_id, &doc.display_name).await?;
    }
    Ok(outcome)
}

/// Train a Drive file (Docs or Sheets) for a bot
pub async fn cmd_train_drive(
    trainer: &Trainer,
    registry: &VectorRegistry,
    drive: &DriveExtractor,
    file_id: &str,
    bot_id: &str,
) -> Result<TrainingOutcome> {
    info!("Training Drive file '{}' for bot '{}'", file_id, bot_id);

    let doc = drive.resolve(file_id).await?;
    let bar = spinner(format!("Training '{}'...", doc.display_name));
    let outcome = trainer.train_document(&doc, bot_id).await;
    bar.finish_and_clear();

    let outcome = outcome?;
    if matches!(outcome, TrainingOutcome::Trained { .. }) {
        registry.register(&doc.document_id, &doc.display_name).await?;
    }
    Ok(outcome)
}

/// Print a training outcome to the console
pub fn print_training_outcome(document_id: &str, bot_id: &str, outcome: &TrainingOutcome) {
    match outcome {
        TrainingOutcome::Trained { fragments } => {
            println!(
                "✓ Trained '{}' for bot '{}' ({} fragments)",
                document_id, bot_id, fragments
            );
        }
        TrainingOutcome::AlreadyCurrent => {
            println!(
                "✓ '{}' is already trained for bot '{}'; nothing to do",
                document_id, bot_id
            );
        }
        TrainingOutcome::BotAttached => {
            println!(
                "✓ '{}' was already trained; attached bot '{}' without re-embedding",
                document_id, bot_id
            );
        }
        TrainingOutcome::Skipped(reason) => {
            println!("⚠ Skipped '{}': {}", document_id, reason);
        }
    }
}
