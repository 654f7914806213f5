//! Google Drive document extraction (Docs and Sheets export)

use super::Extractor;
use crate::config::DriveConfig;
use crate::document::{Document, SourceKind, MIME_GOOGLE_DOC, MIME_GOOGLE_SHEET};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Drive file metadata relevant to training decisions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileMetadata {
    pub name: String,
    pub mime_type: String,
    pub modified_time: DateTime<Utc>,
}

/// Extracts text from Google Docs/Sheets via the Drive export API
pub struct DriveExtractor {
    client: Client,
    base_url: String,
    token_env: String,
}

impl DriveExtractor {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_env: config.token_env.clone(),
        })
    }

    fn token(&self) -> Result<String> {
        std::env::var(&self.token_env).map_err(|_| {
            Error::Config(format!(
                "Drive access token not set (env var {})",
                self.token_env
            ))
        })
    }

    /// Fetch name, MIME type and modification time for a Drive file
    pub async fn file_metadata(&self, file_id: &str) -> Result<DriveFileMetadata> {
        let url = format!(
            "{}/{}?fields=name,mimeType,modifiedTime",
            self.base_url, file_id
        );
        debug!("Fetching Drive metadata for {}", file_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("Drive metadata request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Extraction(format!(
                "Drive metadata for '{}' returned {}",
                file_id,
                response.status()
            )));
        }

        Ok(response.json::<DriveFileMetadata>().await?)
    }

    /// Resolve a Drive file id into a trainable [`Document`]
    pub async fn resolve(&self, file_id: &str) -> Result<Document> {
        let metadata = self.file_metadata(file_id).await?;
        Ok(Document::from_drive(
            file_id,
            &metadata.name,
            &metadata.mime_type,
            metadata.modified_time,
        ))
    }

    async fn export(&self, file_id: &str, export_mime: &str) -> Result<String> {
        let url = format!(
            "{}/{}/export?mimeType={}",
            self.base_url, file_id, export_mime
        );
        debug!("Exporting Drive file {} as {}", file_id, export_mime);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("Drive export request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Extraction(format!(
                "Drive export for '{}' returned {}",
                file_id,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Extractor for DriveExtractor {
    fn supports(&self, doc: &Document) -> bool {
        doc.source_kind == SourceKind::Drive
            && matches!(doc.mime_type.as_str(), MIME_GOOGLE_DOC | MIME_GOOGLE_SHEET)
    }

    async fn extract(&self, doc: &Document) -> Result<String> {
        let export_mime = match doc.mime_type.as_str() {
            MIME_GOOGLE_DOC => "text/plain",
            MIME_GOOGLE_SHEET => "text/csv",
            other => {
                return Err(Error::UnsupportedContentType(format!(
                    "{} (drive source)",
                    other
                )))
            }
        };

        self.export(&doc.document_id, export_mime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_ENV: &str = "DOCENT_TEST_DRIVE_TOKEN";

    fn drive_config(base_url: String) -> DriveConfig {
        DriveConfig {
            base_url,
            token_env: TOKEN_ENV.to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_metadata_and_export_round_trip() {
        std::env::set_var(TOKEN_ENV, "test-token");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/doc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Quarterly Plan",
                "mimeType": MIME_GOOGLE_DOC,
                "modifiedTime": "2024-03-01T10:00:00Z"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/doc-123/export"))
            .and(query_param("mimeType", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Exported body text."))
            .mount(&server)
            .await;

        let extractor = DriveExtractor::new(&drive_config(format!("{}/files", server.uri()))).unwrap();

        let doc = extractor.resolve("doc-123").await.unwrap();
        assert_eq!(doc.display_name, "Quarterly Plan");
        assert_eq!(doc.mime_type, MIME_GOOGLE_DOC);
        assert!(doc.last_modified_at.is_some());

        assert!(extractor.supports(&doc));
        let text = extractor.extract(&doc).await.unwrap();
        assert_eq!(text, "Exported body text.");
    }

    #[tokio::test]
    async fn test_metadata_error_surfaces_as_extraction_failure() {
        std::env::set_var(TOKEN_ENV, "test-token");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = DriveExtractor::new(&drive_config(format!("{}/files", server.uri()))).unwrap();
        let err = extractor
            .file_metadata("missing-id")
            .await
            .expect_err("404 should fail");
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_supports_only_drive_documents() {
        std::env::set_var(TOKEN_ENV, "test-token");
        let extractor =
            DriveExtractor::new(&drive_config("http://127.0.0.1:1/files".to_string())).unwrap();

        let sheet = Document::from_drive("id", "Sheet", MIME_GOOGLE_SHEET, Utc::now());
        assert!(extractor.supports(&sheet));

        let pdf = Document::from_blob("handbook.pdf");
        assert!(!extractor.supports(&pdf));
    }
}
