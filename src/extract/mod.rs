//! Full-text extraction from document sources
//!
//! Each [`Extractor`] handles one family of source kind + MIME type; the
//! [`ExtractorSet`] dispatches a document to the first extractor that
//! supports it and fails unsupported content types up front.

mod drive;
#[cfg(feature = "pdf")]
mod pdf;

pub use drive::*;
#[cfg(feature = "pdf")]
pub use pdf::*;

use crate::document::{Document, SourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Extracts plain text from one family of documents
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Whether this extractor handles the document's source kind and MIME type
    fn supports(&self, doc: &Document) -> bool;

    /// Extract the document's full plain text
    async fn extract(&self, doc: &Document) -> Result<String>;
}

/// Registry of extractors, dispatching on source kind + MIME type
#[derive(Default)]
pub struct ExtractorSet {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Extract text for a document, failing unsupported content types
    pub async fn extract(&self, doc: &Document) -> Result<String> {
        match self.extractors.iter().find(|e| e.supports(doc)) {
            Some(extractor) => extractor.extract(doc).await,
            None => Err(Error::UnsupportedContentType(format!(
                "{} ({} source)",
                doc.mime_type, doc.source_kind
            ))),
        }
    }
}

/// Plain text and Markdown files from the blob documents directory
pub struct TextFileExtractor {
    root: PathBuf,
}

impl TextFileExtractor {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Extractor for TextFileExtractor {
    fn supports(&self, doc: &Document) -> bool {
        doc.source_kind == SourceKind::Blob
            && matches!(doc.mime_type.as_str(), "text/plain" | "text/markdown")
    }

    async fn extract(&self, doc: &Document) -> Result<String> {
        let path = self.root.join(&doc.document_id);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Extraction(format!("Failed to read '{}': {}", path.display(), e))
        })
    }
}
