//! Ingest command handler.
//!
//! Embeds the review corpus and upserts it into the configured index.

use clap::Args;
use profrag_core::{config::AppConfig, AppResult};
use profrag_knowledge::{builtin_reviews, create_provider, create_store, index_spec, load_reviews};
use std::path::PathBuf;

/// Embed reviews and load them into the vector index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// JSON or YAML file of reviews (default: built-in corpus)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let reviews = match self.file {
            Some(ref path) => load_reviews(path)?,
            None => builtin_reviews(),
        };
        tracing::info!("Loaded {} reviews", reviews.len());

        let embedder =
            create_provider(&config.embedding, config.resolve_embedding_key().as_deref())?;
        let store = create_store(config)?;
        let index_name = &config.vector_store.index_name;

        let report = profrag_knowledge::ingest(
            embedder.as_ref(),
            store.as_ref(),
            &reviews,
            index_name,
            &index_spec(config),
        )
        .await?;

        if self.json {
            let output = serde_json::json!({
                "index": index_name,
                "backend": store.backend_name(),
                "createdIndex": report.created_index,
                "upserted": report.upserted,
                "failed": report.failed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            if report.created_index {
                println!("Created index '{}'", index_name);
            }
            println!(
                "Upserted {} reviews into '{}' ({} failed)",
                report.upserted, index_name, report.failed
            );
        }

        Ok(())
    }
}
