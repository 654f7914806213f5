//! Trainable document descriptors

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Where a document's content lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Uploaded file in blob storage (PDFs, plain text)
    Blob,
    /// Google Drive file (Docs, Sheets)
    Drive,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Blob => write!(f, "blob"),
            SourceKind::Drive => write!(f, "drive"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blob" => Ok(SourceKind::Blob),
            "drive" => Ok(SourceKind::Drive),
            _ => Err(Error::Config(format!("Unknown source kind: {}", s))),
        }
    }
}

/// MIME type of a Google Docs document
pub const MIME_GOOGLE_DOC: &str = "application/vnd.google-apps.document";
/// MIME type of a Google Sheets spreadsheet
pub const MIME_GOOGLE_SHEET: &str = "application/vnd.google-apps.spreadsheet";
/// MIME type of a PDF file
pub const MIME_PDF: &str = "application/pdf";

/// A trainable unit of content.
///
/// `document_id` is the stable external identifier: the filename for
/// blob-stored files, the Drive file id for Docs/Sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub display_name: String,
    pub mime_type: String,
    pub source_kind: SourceKind,
    /// External modification timestamp when the source reports one (Drive).
    /// `None` means the document is treated as always current once trained.
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Describe a blob-stored file by its filename
    pub fn from_blob(filename: &str) -> Self {
        let mime_type = mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        let display_name = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();

        Self {
            document_id: filename.to_string(),
            display_name,
            mime_type,
            source_kind: SourceKind::Blob,
            last_modified_at: None,
        }
    }

    /// Describe a Drive file from its metadata
    pub fn from_drive(
        file_id: &str,
        name: &str,
        mime_type: &str,
        modified_time: DateTime<Utc>,
    ) -> Self {
        Self {
            document_id: file_id.to_string(),
            display_name: name.to_string(),
            mime_type: mime_type.to_string(),
            source_kind: SourceKind::Drive,
            last_modified_at: Some(modified_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_document_mime_detection() {
        let doc = Document::from_blob("handbook.pdf");
        assert_eq!(doc.document_id, "handbook.pdf");
        assert_eq!(doc.display_name, "handbook");
        assert_eq!(doc.mime_type, MIME_PDF);
        assert_eq!(doc.source_kind, SourceKind::Blob);
        assert!(doc.last_modified_at.is_none());
    }

    #[test]
    fn test_source_kind_round_trip() {
        assert_eq!("blob".parse::<SourceKind>().unwrap(), SourceKind::Blob);
        assert_eq!("drive".parse::<SourceKind>().unwrap(), SourceKind::Drive);
        assert!("ftp".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::Drive.to_string(), "drive");
    }
}
