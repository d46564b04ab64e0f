//! Vector index stores.
//!
//! A store holds named collections of `(id, vector, metadata)` and answers
//! top-k similarity queries. Two backends exist: a local SQLite file with
//! brute-force scoring and the hosted Pinecone REST API.

pub mod pinecone;
pub mod sqlite;

pub use pinecone::PineconeStore;
pub use sqlite::SqliteVectorStore;

use crate::types::{IndexSpec, IndexedVector, VectorMatch, VectorQuery};
use profrag_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend identifier ("sqlite", "pinecone").
    fn backend_name(&self) -> &str;

    /// Whether the collection exists.
    async fn exists(&self, collection: &str) -> AppResult<bool>;

    /// Create a collection. Fails if it already exists.
    async fn create(&self, collection: &str, spec: &IndexSpec) -> AppResult<()>;

    /// Insert or replace whole records, returning how many were written.
    async fn upsert(&self, collection: &str, records: &[IndexedVector]) -> AppResult<usize>;

    /// Top-k nearest neighbours, ordered by descending score.
    async fn query(&self, collection: &str, query: &VectorQuery) -> AppResult<Vec<VectorMatch>>;

    /// Number of vectors in the collection.
    async fn count(&self, collection: &str) -> AppResult<usize>;
}

/// Build the configured store.
pub fn create_store(config: &AppConfig) -> AppResult<Arc<dyn VectorStore>> {
    match config.vector_store.backend.as_str() {
        "sqlite" => {
            let path = config.vector_db_path();
            Ok(Arc::new(SqliteVectorStore::open(&path)?))
        }
        "pinecone" => {
            let api_key = config.resolve_vector_store_key().ok_or_else(|| {
                AppError::Config(format!(
                    "Pinecone backend requires an API key (set {})",
                    config.vector_store.api_key_env
                ))
            })?;
            Ok(Arc::new(PineconeStore::new(
                &config.vector_store.controller_url,
                &api_key,
            )?))
        }
        other => Err(AppError::Config(format!(
            "Unknown vector store backend: {}",
            other
        ))),
    }
}

/// Index spec derived from configuration.
pub fn index_spec(config: &AppConfig) -> IndexSpec {
    IndexSpec {
        dimension: config.embedding.dimensions,
        metric: config.vector_store.metric.clone(),
        cloud: config.vector_store.cloud.clone(),
        region: config.vector_store.region.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_sqlite_store() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };

        let store = create_store(&config).unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[test]
    fn test_index_spec_defaults() {
        let spec = index_spec(&AppConfig::default());
        assert_eq!(spec, IndexSpec::default());
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = AppConfig::default();
        config.vector_store.backend = "faiss".to_string();
        assert!(create_store(&config).is_err());
    }
}
