//! Vector index integration
//!
//! This module owns everything stored in the similarity index:
//! - The [`VectorIndex`] trait the orchestrator and cleanup code talk to
//! - A Qdrant-backed implementation for production use
//! - An in-memory brute-force implementation for tests and single-process use
//!
//! Vectors are document-scoped and shared across bots; bot scoping happens
//! at query time through the tracking store. Deactivation (soft delete)
//! flips the payload `active` flag so a later sweep can hard-delete in
//! batches.

mod memory;
mod payload;

pub use memory::*;
pub use payload::*;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    points_selector::PointsSelectorOneOf, Condition, CountPointsBuilder, CreateCollectionBuilder,
    DeletePointsBuilder, Distance, Filter, PointId, PointStruct, PointsIdsList,
    ScalarQuantizationBuilder, ScrollPointsBuilder, SearchPointsBuilder, SetPayloadPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

/// A scored match returned from the index
#[derive(Debug, Clone)]
pub struct ScoredFragment {
    pub id: String,
    pub score: f32,
    pub payload: FragmentPayload,
}

/// Selection criteria for index operations
#[derive(Debug, Clone, Default)]
pub struct FragmentFilter {
    /// Restrict to these document ids (any-of)
    pub document_ids: Option<Vec<String>>,
    /// Restrict by soft-delete state
    pub active: Option<bool>,
}

impl FragmentFilter {
    /// Everything stored for one document, active or not
    pub fn document(document_id: &str) -> Self {
        Self {
            document_ids: Some(vec![document_id.to_string()]),
            active: None,
        }
    }

    /// Active fragments of one document
    pub fn active_document(document_id: &str) -> Self {
        Self {
            document_ids: Some(vec![document_id.to_string()]),
            active: Some(true),
        }
    }

    /// Active fragments across a set of documents
    pub fn active_documents(document_ids: Vec<String>) -> Self {
        Self {
            document_ids: Some(document_ids),
            active: Some(true),
        }
    }

    /// Inactive fragments anywhere in the index
    pub fn inactive() -> Self {
        Self {
            document_ids: None,
            active: Some(false),
        }
    }

    fn to_qdrant_filter(&self) -> Option<Filter> {
        let mut must: Vec<Condition> = Vec::new();

        if let Some(ref document_ids) = self.document_ids {
            if document_ids.len() == 1 {
                must.push(Condition::matches("document_id", document_ids[0].clone()));
            } else {
                must.push(Condition::matches("document_id", document_ids.clone()));
            }
        }

        if let Some(active) = self.active {
            must.push(Condition::matches("active", active));
        }

        if must.is_empty() {
            return None;
        }

        Some(Filter {
            must,
            should: vec![],
            must_not: vec![],
            min_should: None,
        })
    }
}

/// Operations the core needs from a similarity index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records (ids are deterministic, see [`point_id`])
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Similarity search restricted by `filter`
    async fn search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &FragmentFilter,
    ) -> Result<Vec<ScoredFragment>>;

    /// All point ids matching `filter`
    async fn list_ids(&self, filter: &FragmentFilter) -> Result<Vec<Uuid>>;

    /// All points matching `filter`, with payloads (no vectors)
    async fn list_payloads(&self, filter: &FragmentFilter)
        -> Result<Vec<(Uuid, FragmentPayload)>>;

    /// Number of points matching `filter`
    async fn count(&self, filter: &FragmentFilter) -> Result<usize>;

    /// Soft-delete: mark points inactive, returning how many were touched
    async fn deactivate(&self, ids: &[Uuid]) -> Result<usize>;

    /// Hard-delete points
    async fn delete(&self, ids: &[Uuid]) -> Result<()>;
}

/// Collection statistics
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub collection: String,
    pub points_count: usize,
}

/// Qdrant-backed vector index
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub async fn connect(config: &Config) -> Result<Self> {
        let api_key = if config.qdrant_api_key_env.is_empty() {
            None
        } else {
            std::env::var(&config.qdrant_api_key_env).ok()
        };

        Self::new(
            &config.qdrant_url,
            &config.collection_name,
            config.embedding.resolved_dimension(),
            api_key,
        )
        .await
    }

    /// Create a new store connection directly with URL and collection name
    pub async fn new(
        url: &str,
        collection: &str,
        dimension: usize,
        api_key: Option<String>,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(url).skip_compatibility_check();
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Get the expected vector dimension for this store
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Ensure the collection exists with correct configuration
    pub async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;

        if exists {
            debug!("Collection {} already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await?;

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        let exists = self.client.collection_exists(&self.collection).await?;
        Ok(exists)
    }

    /// Get collection statistics
    pub async fn get_stats(&self) -> Result<CollectionStats> {
        let info = self.client.collection_info(&self.collection).await?;

        let points_count = info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0);

        Ok(CollectionStats {
            collection: self.collection.clone(),
            points_count: points_count as usize,
        })
    }

    fn validate_dimensions(&self, records: &[VectorRecord]) -> Result<()> {
        if let Some(mismatch) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(Error::VectorStore(format!(
                "Vector dimension mismatch for collection '{}': expected {}, got {}",
                self.collection,
                self.dimension,
                mismatch.vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.validate_dimensions(&records)?;

        debug!(
            "Upserting {} points to collection {}",
            records.len(),
            self.collection
        );

        let point_structs: Vec<PointStruct> =
            records.into_iter().map(|r| r.to_point_struct()).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs))
            .await?;

        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &FragmentFilter,
    ) -> Result<Vec<ScoredFragment>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, top_k
        );

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, vector, top_k as u64).with_payload(true);

        if let Some(qdrant_filter) = filter.to_qdrant_filter() {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let response = self.client.search_points(search_builder).await?;

        let results: Vec<ScoredFragment> = response
            .result
            .into_iter()
            .map(|p| {
                let payload: FragmentPayload = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();

                ScoredFragment {
                    id: point_id_to_string(p.id),
                    score: p.score,
                    payload,
                }
            })
            .collect();

        Ok(results)
    }

    async fn list_ids(&self, filter: &FragmentFilter) -> Result<Vec<Uuid>> {
        let mut all_ids = Vec::new();
        let mut offset: Option<PointId> = None;
        let batch_size = 1000u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(false)
                .with_vectors(false);

            if let Some(qdrant_filter) = filter.to_qdrant_filter() {
                scroll_builder = scroll_builder.filter(qdrant_filter);
            }

            if let Some(ref o) = offset {
                scroll_builder = scroll_builder.offset(o.clone());
            }

            let response = self.client.scroll(scroll_builder).await?;

            let points = response.result;
            if points.is_empty() {
                break;
            }

            for point in &points {
                if let Some(ref id) = point.id {
                    if let Some(uuid) = point_id_to_uuid(id) {
                        all_ids.push(uuid);
                    }
                }
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(all_ids)
    }

    async fn list_payloads(
        &self,
        filter: &FragmentFilter,
    ) -> Result<Vec<(Uuid, FragmentPayload)>> {
        let mut all = Vec::new();
        let mut offset: Option<PointId> = None;
        let batch_size = 1000u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(true)
                .with_vectors(false);

            if let Some(qdrant_filter) = filter.to_qdrant_filter() {
                scroll_builder = scroll_builder.filter(qdrant_filter);
            }

            if let Some(ref o) = offset {
                scroll_builder = scroll_builder.offset(o.clone());
            }

            let response = self.client.scroll(scroll_builder).await?;

            let points = response.result;
            if points.is_empty() {
                break;
            }

            for point in points {
                let Some(uuid) = point.id.as_ref().and_then(point_id_to_uuid) else {
                    continue;
                };
                let payload: FragmentPayload = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();
                all.push((uuid, payload));
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(all)
    }

    async fn count(&self, filter: &FragmentFilter) -> Result<usize> {
        let mut count_builder = CountPointsBuilder::new(&self.collection).exact(true);

        if let Some(qdrant_filter) = filter.to_qdrant_filter() {
            count_builder = count_builder.filter(qdrant_filter);
        }

        let response = self.client.count(count_builder).await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn deactivate(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        debug!(
            "Deactivating {} points in collection {}",
            ids.len(),
            self.collection
        );

        let point_ids: Vec<PointId> = ids
            .iter()
            .map(|id| PointId::from(id.to_string()))
            .collect();
        let selector = PointsSelectorOneOf::Points(PointsIdsList { ids: point_ids });

        let mut payload = std::collections::HashMap::new();
        payload.insert(
            "active".to_string(),
            qdrant_client::qdrant::Value {
                kind: Some(qdrant_client::qdrant::value::Kind::BoolValue(false)),
            },
        );

        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, payload)
                    .points_selector(selector)
                    .wait(true),
            )
            .await?;

        Ok(ids.len())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points from collection {}",
            ids.len(),
            self.collection
        );

        let point_ids: Vec<PointId> = ids
            .iter()
            .map(|id| PointId::from(id.to_string()))
            .collect();

        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(point_ids))
            .await?;

        Ok(())
    }
}

/// Convert PointId to string
fn point_id_to_string(id: Option<PointId>) -> String {
    match id {
        Some(PointId {
            point_id_options: Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)),
        }) => uuid,
        Some(PointId {
            point_id_options: Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)),
        }) => num.to_string(),
        _ => String::new(),
    }
}

/// Convert PointId to UUID
fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid_str)) => {
            Uuid::try_parse(uuid_str).ok()
        }
        _ => None,
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
