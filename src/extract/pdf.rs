//! PDF text extraction from the blob documents directory

use super::Extractor;
use crate::document::{Document, SourceKind, MIME_PDF};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Extracts text from blob-stored PDF files
pub struct PdfExtractor {
    root: PathBuf,
}

impl PdfExtractor {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn supports(&self, doc: &Document) -> bool {
        doc.source_kind == SourceKind::Blob && doc.mime_type == MIME_PDF
    }

    async fn extract(&self, doc: &Document) -> Result<String> {
        let path = self.root.join(&doc.document_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            Error::Extraction(format!("Failed to read '{}': {}", path.display(), e))
        })?;

        debug!("Extracting text from {} ({} bytes)", doc.document_id, bytes.len());

        // pdf-extract is synchronous and CPU-heavy
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| Error::Extraction(format!("Task join error: {}", e)))?
            .map_err(|e| Error::Extraction(format!("PDF parse failed: {}", e)))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_only_blob_pdfs() {
        let extractor = PdfExtractor::new(PathBuf::from("/tmp"));

        assert!(extractor.supports(&Document::from_blob("handbook.pdf")));
        assert!(!extractor.supports(&Document::from_blob("notes.txt")));

        let drive_doc = Document::from_drive(
            "file-id",
            "Doc",
            crate::document::MIME_GOOGLE_DOC,
            chrono::Utc::now(),
        );
        assert!(!extractor.supports(&drive_doc));
    }
}
