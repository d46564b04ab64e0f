//! Offline ingestion: embed review comments and upsert them into the index.

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{IndexSpec, IndexedVector, IngestReport, ReviewRecord};
use profrag_core::AppResult;
use std::time::Instant;

/// Embed and upsert `reviews` into `index_name`, creating it when absent.
///
/// Records are processed one at a time. A record that fails validation,
/// embedding or upsert is logged and counted; the rest of the batch
/// continues. Only collection checks and creation abort the run.
pub async fn ingest(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    reviews: &[ReviewRecord],
    index_name: &str,
    spec: &IndexSpec,
) -> AppResult<IngestReport> {
    let start = Instant::now();
    let mut report = IngestReport::default();

    if store.exists(index_name).await? {
        tracing::info!("Index '{}' already exists.", index_name);
    } else {
        store.create(index_name, spec).await?;
        report.created_index = true;
        tracing::info!("Index '{}' created successfully.", index_name);
    }

    for review in reviews {
        if let Err(e) = review.validate() {
            tracing::warn!(id = %review.id, error = %e, "Skipping invalid review");
            report.failed += 1;
            continue;
        }

        let values = match embedder.embed(&review.review_comment).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(id = %review.id, error = %e, "Failed to embed review");
                report.failed += 1;
                continue;
            }
        };

        let record = IndexedVector {
            id: review.id.clone(),
            values,
            metadata: review.metadata(),
        };

        match store.upsert(index_name, std::slice::from_ref(&record)).await {
            Ok(_) => {
                report.upserted += 1;
                tracing::debug!(id = %review.id, "Upserted review");
            }
            Err(e) => {
                tracing::warn!(id = %review.id, error = %e, "Failed to upsert review");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Ingestion completed: {} upserted, {} failed in {:.2}s",
        report.upserted,
        report.failed,
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::builtin_reviews;
    use crate::embeddings::providers::mock::MockProvider;
    use crate::store::SqliteVectorStore;
    use profrag_core::AppError;

    /// Fails for any text containing "FAIL".
    #[derive(Debug)]
    struct FlakyEmbedder {
        inner: MockProvider,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("FAIL")) {
                return Err(AppError::Knowledge("embedding service unavailable".to_string()));
            }
            self.inner.embed_batch(texts).await
        }
    }

    fn spec() -> IndexSpec {
        IndexSpec {
            dimension: 64,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_creates_index_once() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let embedder = MockProvider::new(64);
        let reviews = builtin_reviews();

        let first = ingest(&embedder, &store, &reviews, "professors", &spec())
            .await
            .unwrap();
        assert!(first.created_index);
        assert_eq!(first.upserted, 20);
        assert_eq!(first.failed, 0);

        let second = ingest(&embedder, &store, &reviews, "professors", &spec())
            .await
            .unwrap();
        assert!(!second.created_index);
        assert_eq!(second.upserted, 20);

        // Same ids re-upserted: no duplicates
        assert_eq!(store.count("professors").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_ingest_continues_after_record_failures() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let embedder = FlakyEmbedder {
            inner: MockProvider::new(64),
        };

        let mut reviews = builtin_reviews();
        reviews.truncate(3);
        reviews[1].review_comment = "FAIL to embed".to_string();
        reviews[2].star_rating = 9;

        let report = ingest(&embedder, &store, &reviews, "professors", &spec())
            .await
            .unwrap();

        assert_eq!(report.upserted, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(store.count("professors").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_counts_upsert_failures() {
        let store = SqliteVectorStore::in_memory().unwrap();
        // Provider dimension disagrees with the collection
        let embedder = MockProvider::new(32);

        let report = ingest(&embedder, &store, &builtin_reviews()[..2], "professors", &spec())
            .await
            .unwrap();

        assert!(report.created_index);
        assert_eq!(report.upserted, 0);
        assert_eq!(report.failed, 2);
    }
}
