//! Search command handler.
//!
//! Runs only the retrieval step for a query and prints the matches.

use clap::Args;
use profrag_core::{config::AppConfig, AppResult};

use crate::services::build_retriever;

/// Show the reviews retrieved for a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of reviews to retrieve (default: retrieval.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let mut retriever = build_retriever(config)?;
        if let Some(k) = self.top_k {
            retriever = retriever.with_top_k(k);
        }

        let matches = retriever.retrieve(&self.query).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&matches)?);
            return Ok(());
        }

        if matches.is_empty() {
            println!("No information found for the given query.");
            return Ok(());
        }

        for (i, m) in matches.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} - {} ({}/5)",
                i + 1,
                m.score,
                m.professor,
                m.subject,
                m.star_rating
            );
            println!("   {}", m.review_comment);
        }

        Ok(())
    }
}
