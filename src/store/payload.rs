//! Payload schema and deterministic ids for stored fragments

use crate::document::SourceKind;
use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Sanitize an external identifier to the storage backend's allowed
/// character set.
///
/// Keeps ASCII alphanumerics plus `-`, `_` and `.`; every other character
/// (accents, spaces, non-ASCII) maps to `_`. Applied up front so the same
/// document id always produces the same point ids regardless of call site.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Deterministic point id for one fragment of one document.
///
/// UUIDv5 of the sanitized canonical key `"{document_id}#{fragment_index}"`,
/// so retraining a document overwrites its previous points index-for-index.
pub fn point_id(document_id: &str, fragment_index: usize) -> Uuid {
    let key = format!("{}#{}", sanitize_id(document_id), fragment_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// One embedded fragment ready to be upserted
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: FragmentPayload,
}

impl VectorRecord {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Metadata stored with each fragment in the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentPayload {
    /// Stable external document identifier
    pub document_id: String,

    /// Human-readable document name
    pub display_name: String,

    /// Content type used to select the extraction strategy
    pub mime_type: String,

    /// Where the document came from ("blob", "drive")
    pub source_kind: String,

    /// Fragment order within the document
    pub fragment_index: i64,

    /// Nearest enclosing heading hierarchy, for citation context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    /// The fragment text itself
    pub text: String,

    /// Soft-delete flag; queries filter on `active = true`
    pub active: bool,

    /// When this fragment was embedded
    pub trained_at: String,
}

impl FragmentPayload {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        display_name: String,
        mime_type: String,
        source_kind: SourceKind,
        fragment_index: i64,
        heading: Option<String>,
        text: String,
        trained_at: String,
    ) -> Self {
        Self {
            document_id,
            display_name,
            mime_type,
            source_kind: source_kind.to_string(),
            fragment_index,
            heading,
            text,
            active: true,
            trained_at,
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("document_id".to_string(), string_to_qdrant(&self.document_id));
        map.insert(
            "display_name".to_string(),
            string_to_qdrant(&self.display_name),
        );
        map.insert("mime_type".to_string(), string_to_qdrant(&self.mime_type));
        map.insert(
            "source_kind".to_string(),
            string_to_qdrant(&self.source_kind),
        );
        map.insert(
            "fragment_index".to_string(),
            int_to_qdrant(self.fragment_index),
        );
        map.insert("text".to_string(), string_to_qdrant(&self.text));
        map.insert("active".to_string(), bool_to_qdrant(self.active));
        map.insert("trained_at".to_string(), string_to_qdrant(&self.trained_at));

        if let Some(ref heading) = self.heading {
            map.insert("heading".to_string(), string_to_qdrant(heading));
        }

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

fn bool_to_qdrant(b: bool) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::BoolValue(b)),
    }
}

impl From<Map<String, Value>> for FragmentPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_else(|_| FragmentPayload {
            document_id: String::new(),
            display_name: String::new(),
            mime_type: String::new(),
            source_kind: String::new(),
            fragment_index: 0,
            heading: None,
            text: String::new(),
            active: false,
            trained_at: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id_keeps_safe_characters() {
        assert_eq!(sanitize_id("handbook-v2_final.pdf"), "handbook-v2_final.pdf");
        assert_eq!(sanitize_id("año fiscal.pdf"), "a_o_fiscal.pdf");
        assert_eq!(sanitize_id("docs/guide"), "docs_guide");
    }

    #[test]
    fn test_point_id_is_deterministic() {
        let a = point_id("handbook.pdf", 0);
        let b = point_id("handbook.pdf", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_point_id_varies_by_document_and_index() {
        let base = point_id("handbook.pdf", 0);
        assert_ne!(base, point_id("handbook.pdf", 1));
        assert_ne!(base, point_id("other.pdf", 0));
    }

    #[test]
    fn test_point_id_ignores_unsafe_character_variants() {
        // Both inputs sanitize to the same canonical key
        assert_eq!(point_id("a b.pdf", 3), point_id("a_b.pdf", 3));
    }

    #[test]
    fn test_payload_serialization_round_trip() {
        let payload = FragmentPayload::new(
            "handbook.pdf".to_string(),
            "handbook".to_string(),
            "application/pdf".to_string(),
            SourceKind::Blob,
            2,
            Some("Guide > Setup".to_string()),
            "Fragment text here.".to_string(),
            "2024-01-01T00:00:00Z".to_string(),
        );

        let json = serde_json::to_string(&payload).unwrap();
        let parsed: FragmentPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.document_id, "handbook.pdf");
        assert_eq!(parsed.fragment_index, 2);
        assert_eq!(parsed.heading.as_deref(), Some("Guide > Setup"));
        assert!(parsed.active);
    }

    #[test]
    fn test_qdrant_payload_contains_active_flag() {
        let payload = FragmentPayload::new(
            "doc".to_string(),
            "doc".to_string(),
            "text/plain".to_string(),
            SourceKind::Drive,
            0,
            None,
            "text".to_string(),
            "2024-01-01T00:00:00Z".to_string(),
        );

        let map = payload.to_qdrant_payload();
        assert!(map.contains_key("active"));
        assert!(map.contains_key("document_id"));
        assert!(!map.contains_key("heading"));
    }
}
