//! Embedding providers turning review text into fixed-length vectors.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
