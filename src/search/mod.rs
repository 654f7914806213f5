//! Query-time context retrieval
//!
//! Resolves a bot's document set from the tracking store, embeds the query,
//! searches the active vectors restricted to that set and formats the
//! matches into grounded text for the response generator.

use crate::config::SearchConfig;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::store::{FragmentFilter, ScoredFragment, VectorIndex};
use crate::tracking::TrackingStore;
use std::sync::Arc;
use tracing::debug;

/// Retrieves grounded context for chat queries
pub struct ContextSearcher {
    tracking: Arc<TrackingStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl ContextSearcher {
    pub fn new(
        tracking: Arc<TrackingStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: SearchConfig,
    ) -> Self {
        Self {
            tracking,
            index,
            embedder,
            config,
        }
    }

    /// Scored fragments relevant to the query, scoped to the bot's
    /// documents.
    ///
    /// Matches below `min_score` are discarded; when fewer than
    /// `min_results` survive, the cut is relaxed to `fallback_score` so a
    /// sparse corpus still yields context.
    pub async fn search(&self, query: &str, bot_id: &str) -> Result<Vec<ScoredFragment>> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query text is required".to_string()));
        }
        if bot_id.trim().is_empty() {
            return Err(Error::Validation("bot id is required".to_string()));
        }

        let state = self.tracking.get().await?;
        let documents: Vec<String> = state
            .iter()
            .filter(|(_, record)| record.uses_bot(bot_id))
            .map(|(document_id, _)| document_id.clone())
            .collect();

        if documents.is_empty() {
            debug!("Bot '{}' has no trained documents", bot_id);
            return Ok(Vec::new());
        }

        let mut embeddings = self.embedder.embed(vec![query.to_string()]).await?;
        let query_vector = embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))?;

        let matches = self
            .index
            .search(
                query_vector,
                self.config.top_k,
                &FragmentFilter::active_documents(documents),
            )
            .await?;

        let primary: Vec<ScoredFragment> = matches
            .iter()
            .filter(|m| m.score >= self.config.min_score)
            .cloned()
            .collect();

        let relevant = if primary.len() < self.config.min_results {
            matches
                .into_iter()
                .filter(|m| m.score >= self.config.fallback_score)
                .collect()
        } else {
            primary
        };

        debug!(
            "Query for bot '{}' matched {} relevant fragments",
            bot_id,
            relevant.len()
        );
        Ok(relevant)
    }

    /// Grounded context text for the response generator, or `None` when
    /// nothing relevant was found.
    pub async fn search_context(&self, query: &str, bot_id: &str) -> Result<Option<String>> {
        let matches = self.search(query, bot_id).await?;
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(format_context(&matches)))
    }
}

/// Group matches under their heading and attribute each to its source
/// document, in first-seen order.
pub fn format_context(matches: &[ScoredFragment]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: std::collections::HashMap<&str, Vec<String>> =
        std::collections::HashMap::new();

    for fragment in matches {
        let title = fragment
            .payload
            .heading
            .as_deref()
            .unwrap_or("Relevant information");
        if !grouped.contains_key(title) {
            order.push(title);
        }
        grouped.entry(title).or_default().push(format!(
            "{}\n(Source: {})",
            fragment.payload.text, fragment.payload.display_name
        ));
    }

    order
        .into_iter()
        .map(|title| format!("**{}**\n{}", title, grouped[title].join("\n\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceKind;
    use crate::store::{point_id, FragmentPayload, MemoryIndex, VectorRecord};
    use crate::tracking::{MemoryBlobStore, TrackingRecord};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder mapping known keywords onto fixed directions
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("alpha") {
                        vec![1.0, 0.0, 0.0]
                    } else if t.contains("beta") {
                        vec![0.0, 1.0, 0.0]
                    } else {
                        vec![0.0, 0.0, 1.0]
                    }
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "keyword-test-model"
        }
    }

    struct Fixture {
        searcher: ContextSearcher,
        embedder: Arc<KeywordEmbedder>,
        tracking: Arc<TrackingStore>,
        index: Arc<MemoryIndex>,
    }

    fn fixture(config: SearchConfig) -> Fixture {
        let tracking = Arc::new(TrackingStore::new(
            Arc::new(MemoryBlobStore::new()),
            "documentTracking.json",
        ));
        let index = Arc::new(MemoryIndex::new());
        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let searcher = ContextSearcher::new(
            tracking.clone(),
            index.clone(),
            embedder.clone(),
            config,
        );
        Fixture {
            searcher,
            embedder,
            tracking,
            index,
        }
    }

    async fn seed_fragment(
        fx: &Fixture,
        document_id: &str,
        index: usize,
        heading: Option<&str>,
        text: &str,
        vector: Vec<f32>,
    ) {
        fx.index
            .upsert(vec![VectorRecord {
                id: point_id(document_id, index),
                vector,
                payload: FragmentPayload::new(
                    document_id.to_string(),
                    document_id.trim_end_matches(".pdf").to_string(),
                    "application/pdf".to_string(),
                    SourceKind::Blob,
                    index as i64,
                    heading.map(|h| h.to_string()),
                    text.to_string(),
                    Utc::now().to_rfc3339(),
                ),
            }])
            .await
            .unwrap();
    }

    async fn link(fx: &Fixture, document_id: &str, bots: &[&str]) {
        let record = TrackingRecord {
            document_id: document_id.to_string(),
            filename: document_id.to_string(),
            mime_type: Some("application/pdf".to_string()),
            used_by_bots: bots.iter().map(|b| b.to_string()).collect(),
            trained_at: Utc::now(),
        };
        let key = document_id.to_string();
        fx.tracking
            .mutate(move |state| {
                state.insert(key, record);
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_scopes_to_bot_documents() {
        let fx = fixture(SearchConfig::default());
        seed_fragment(&fx, "a.pdf", 0, Some("Alpha"), "alpha text", vec![1.0, 0.0, 0.0]).await;
        seed_fragment(&fx, "b.pdf", 0, Some("Beta"), "more alpha text", vec![1.0, 0.0, 0.0]).await;
        link(&fx, "a.pdf", &["botA"]).await;
        link(&fx, "b.pdf", &["botB"]).await;

        let matches = fx.searcher.search("alpha question", "botA").await.unwrap();

        // b.pdf scores identically but belongs to another bot
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload.document_id, "a.pdf");
    }

    #[tokio::test]
    async fn test_bot_without_documents_skips_embedding() {
        let fx = fixture(SearchConfig::default());
        seed_fragment(&fx, "a.pdf", 0, None, "alpha text", vec![1.0, 0.0, 0.0]).await;
        link(&fx, "a.pdf", &["botA"]).await;

        let matches = fx.searcher.search("alpha", "botUnknown").await.unwrap();
        assert!(matches.is_empty());
        assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inactive_fragments_are_invisible() {
        let fx = fixture(SearchConfig::default());
        seed_fragment(&fx, "a.pdf", 0, None, "alpha text", vec![1.0, 0.0, 0.0]).await;
        link(&fx, "a.pdf", &["botA"]).await;

        let ids = fx
            .index
            .list_ids(&FragmentFilter::document("a.pdf"))
            .await
            .unwrap();
        fx.index.deactivate(&ids).await.unwrap();

        let matches = fx.searcher.search("alpha", "botA").await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_score_cut_relaxes_when_results_are_scarce() {
        let config = SearchConfig {
            top_k: 10,
            min_score: 0.95,
            fallback_score: 0.3,
            min_results: 2,
        };
        let fx = fixture(config);
        link(&fx, "a.pdf", &["botA"]).await;

        // One near-exact match and two mid-score matches
        seed_fragment(&fx, "a.pdf", 0, None, "exact", vec![1.0, 0.0, 0.0]).await;
        seed_fragment(&fx, "a.pdf", 1, None, "close", vec![0.7, 0.7, 0.0]).await;
        seed_fragment(&fx, "a.pdf", 2, None, "close too", vec![0.7, 0.0, 0.7]).await;
        // And one that misses even the relaxed cut
        seed_fragment(&fx, "a.pdf", 3, None, "far", vec![0.0, 1.0, 0.0]).await;

        let matches = fx.searcher.search("alpha", "botA").await.unwrap();

        // Only one match clears 0.95, so the cut relaxes to 0.3
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.score >= 0.3));
    }

    #[tokio::test]
    async fn test_strict_cut_holds_when_enough_results() {
        let config = SearchConfig {
            top_k: 10,
            min_score: 0.9,
            fallback_score: 0.3,
            min_results: 1,
        };
        let fx = fixture(config);
        link(&fx, "a.pdf", &["botA"]).await;

        seed_fragment(&fx, "a.pdf", 0, None, "exact", vec![1.0, 0.0, 0.0]).await;
        seed_fragment(&fx, "a.pdf", 1, None, "mid", vec![0.7, 0.7, 0.0]).await;

        let matches = fx.searcher.search("alpha", "botA").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload.text, "exact");
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let fx = fixture(SearchConfig::default());
        let err = fx
            .searcher
            .search("   ", "botA")
            .await
            .expect_err("blank query");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_context_groups_by_heading() {
        let fx = fixture(SearchConfig {
            top_k: 10,
            min_score: 0.1,
            fallback_score: 0.1,
            min_results: 1,
        });
        link(&fx, "a.pdf", &["botA"]).await;
        seed_fragment(
            &fx,
            "a.pdf",
            0,
            Some("Guide > Setup"),
            "Install the service.",
            vec![1.0, 0.0, 0.0],
        )
        .await;
        seed_fragment(
            &fx,
            "a.pdf",
            1,
            Some("Guide > Setup"),
            "Configure the endpoint.",
            vec![0.9, 0.1, 0.0],
        )
        .await;
        seed_fragment(
            &fx,
            "a.pdf",
            2,
            None,
            "Unrelated trivia.",
            vec![0.8, 0.2, 0.0],
        )
        .await;

        let context = fx
            .searcher
            .search_context("alpha", "botA")
            .await
            .unwrap()
            .expect("matches exist");

        assert!(context.contains("**Guide > Setup**"));
        assert!(context.contains("Install the service."));
        assert!(context.contains("Configure the endpoint."));
        assert!(context.contains("**Relevant information**"));
        assert!(context.contains("(Source: a)"));

        // Both setup fragments live under one heading block
        assert_eq!(context.matches("**Guide > Setup**").count(), 1);
    }

    #[tokio::test]
    async fn test_search_context_returns_none_without_matches() {
        let fx = fixture(SearchConfig::default());
        link(&fx, "a.pdf", &["botA"]).await;
        seed_fragment(&fx, "a.pdf", 0, None, "beta text", vec![0.0, 1.0, 0.0]).await;

        let context = fx.searcher.search_context("alpha", "botA").await.unwrap();
        assert!(context.is_none());
    }
}
