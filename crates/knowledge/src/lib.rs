//! Professor review knowledge base.
//!
//! Holds the review corpus, embeds it into a vector store during ingestion,
//! and retrieves the nearest reviews for a chat query.

pub mod corpus;
pub mod embeddings;
pub mod ingest;
pub mod retrieval;
pub mod store;
pub mod types;

pub use corpus::{builtin_reviews, load_reviews};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::ingest;
pub use retrieval::{Retriever, DEFAULT_TOP_K};
pub use store::{create_store, index_spec, PineconeStore, SqliteVectorStore, VectorStore};
pub use types::{
    IndexSpec, IndexedVector, IngestReport, ReviewMetadata, ReviewRecord, ScoredMatch,
    VectorMatch, VectorQuery,
};
