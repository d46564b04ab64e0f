//! Retrieval adapter: query text to scored review matches.

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{ScoredMatch, VectorQuery};
use profrag_core::AppResult;
use std::sync::Arc;

/// Default number of matches per query.
pub const DEFAULT_TOP_K: usize = 10;

/// Embeds a query and fetches the nearest reviews.
///
/// Failures never reach the caller: an unavailable embedding provider or
/// store yields an empty list, so a turn can always continue without
/// evidence.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    index_name: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            index_name: index_name.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Nearest reviews for `query`, in store order (descending score).
    pub async fn retrieve(&self, query: &str) -> Vec<ScoredMatch> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        match self.try_retrieve(query).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Error querying vector store");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &str) -> AppResult<Vec<ScoredMatch>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .query(
                &self.index_name,
                &VectorQuery {
                    vector,
                    top_k: self.top_k,
                    include_metadata: true,
                },
            )
            .await?;

        let mut matches = Vec::with_capacity(hits.len());
        for hit in &hits {
            match ScoredMatch::from_vector_match(hit) {
                Some(scored) => matches.push(scored),
                None => tracing::warn!(id = %hit.id, "Skipping match with undecodable metadata"),
            }
        }

        tracing::info!(
            query_len = query.len(),
            matches = matches.len(),
            "Retrieved reviews"
        );
        Ok(matches)
    }
}
