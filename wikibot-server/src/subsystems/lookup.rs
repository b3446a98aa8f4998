//! Similarity lookup — embeds the English query and asks the relational
//! store's similarity function for the closest articles.
//!
//! Failures never reach the caller: an embedding, connection or query error is
//! logged and the lookup yields no rows, which the router turns into a
//! "no answer" reply.

use std::cmp::Ordering;
use std::sync::Arc;

use wikibot_core::config::MAX_TOP_K;
use wikibot_core::db::ArticleIndex;
use wikibot_core::embeddings::EmbeddingBackend;
use wikibot_core::models::SimilarityResult;

pub struct SimilarityLookup {
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn ArticleIndex>,
    top_k: usize,
}

impl SimilarityLookup {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn ArticleIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.clamp(1, MAX_TOP_K),
        }
    }

    pub async fn lookup(&self, query: &str) -> Vec<SimilarityResult> {
        let embedding = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(backend = self.embedder.name(), error = %e, "Failed to embed query");
                return Vec::new();
            }
        };

        match self.index.nearest(embedding, self.top_k).await {
            Ok(rows) => {
                let rows = rank(rows, self.top_k);
                tracing::info!(query = %query, matches = rows.len(), "Similarity lookup complete");
                rows
            }
            Err(e) => {
                tracing::error!(error = %e, "Similarity lookup failed");
                Vec::new()
            }
        }
    }
}

/// Order rows by descending score and keep at most `top_k` (never more than 3).
pub fn rank(mut rows: Vec<SimilarityResult>, top_k: usize) -> Vec<SimilarityResult> {
    rows.sort_by(|a, b| b.distance.partial_cmp(&a.distance).unwrap_or(Ordering::Equal));
    rows.truncate(top_k.min(MAX_TOP_K));
    rows
}
