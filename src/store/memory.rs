//! In-memory [`VectorIndex`] implementation for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored vectors.

use super::{FragmentFilter, FragmentPayload, ScoredFragment, VectorIndex, VectorRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

struct StoredRecord {
    vector: Vec<f32>,
    payload: FragmentPayload,
}

/// In-memory index for testing and single-process deployments
#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<HashMap<Uuid, StoredRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(payload: &FragmentPayload, filter: &FragmentFilter) -> bool {
    if let Some(ref document_ids) = filter.document_ids {
        if !document_ids.iter().any(|id| id == &payload.document_id) {
            return false;
        }
    }
    if let Some(active) = filter.active {
        if payload.active != active {
            return false;
        }
    }
    true
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(
                record.id,
                StoredRecord {
                    vector: record.vector,
                    payload: record.payload,
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &FragmentFilter,
    ) -> Result<Vec<ScoredFragment>> {
        let stored = self.records.read().unwrap();
        let mut results: Vec<ScoredFragment> = stored
            .iter()
            .filter(|(_, r)| matches_filter(&r.payload, filter))
            .map(|(id, r)| ScoredFragment {
                id: id.to_string(),
                score: cosine_sim(&vector, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn list_ids(&self, filter: &FragmentFilter) -> Result<Vec<Uuid>> {
        let stored = self.records.read().unwrap();
        let mut ids: Vec<Uuid> = stored
            .iter()
            .filter(|(_, r)| matches_filter(&r.payload, filter))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_payloads(
        &self,
        filter: &FragmentFilter,
    ) -> Result<Vec<(Uuid, FragmentPayload)>> {
        let stored = self.records.read().unwrap();
        let mut records: Vec<(Uuid, FragmentPayload)> = stored
            .iter()
            .filter(|(_, r)| matches_filter(&r.payload, filter))
            .map(|(id, r)| (*id, r.payload.clone()))
            .collect();
        records.sort_by(|a, b| {
            (&a.1.document_id, a.1.fragment_index).cmp(&(&b.1.document_id, b.1.fragment_index))
        });
        Ok(records)
    }

    async fn count(&self, filter: &FragmentFilter) -> Result<usize> {
        let stored = self.records.read().unwrap();
        Ok(stored
            .values()
            .filter(|r| matches_filter(&r.payload, filter))
            .count())
    }

    async fn deactivate(&self, ids: &[Uuid]) -> Result<usize> {
        let mut stored = self.records.write().unwrap();
        let mut touched = 0;
        for id in ids {
            if let Some(record) = stored.get_mut(id) {
                record.payload.active = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceKind;
    use crate::store::point_id;

    fn record(document_id: &str, index: usize, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: point_id(document_id, index),
            vector,
            payload: FragmentPayload::new(
                document_id.to_string(),
                document_id.to_string(),
                "text/plain".to_string(),
                SourceKind::Blob,
                index as i64,
                None,
                format!("fragment {index}"),
                "2024-01-01T00:00:00Z".to_string(),
            ),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![record("doc", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(vec![record("doc", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count(&FragmentFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_respects_filter() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![
                record("a", 0, vec![1.0, 0.0]),
                record("a", 1, vec![0.0, 1.0]),
                record("b", 0, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let results = index
            .search(vec![1.0, 0.0], 10, &FragmentFilter::active_document("a"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload.fragment_index, 0);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_active_filter() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![record("doc", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let ids = index
            .list_ids(&FragmentFilter::active_document("doc"))
            .await
            .unwrap();
        let touched = index.deactivate(&ids).await.unwrap();
        assert_eq!(touched, 1);

        assert_eq!(
            index
                .count(&FragmentFilter::active_document("doc"))
                .await
                .unwrap(),
            0
        );
        assert_eq!(index.count(&FragmentFilter::inactive()).await.unwrap(), 1);
        // Still present until swept
        assert_eq!(
            index.count(&FragmentFilter::document("doc")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_removes_records() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![
                record("doc", 0, vec![1.0, 0.0]),
                record("doc", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let ids = index
            .list_ids(&FragmentFilter::document("doc"))
            .await
            .unwrap();
        index.delete(&ids).await.unwrap();

        assert_eq!(index.count(&FragmentFilter::default()).await.unwrap(), 0);
    }
}
