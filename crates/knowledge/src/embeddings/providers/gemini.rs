//! Gemini embedding provider (`embedContent` REST API).

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use profrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Gemini embedding provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,

    /// API base, e.g. `https://generativelanguage.googleapis.com/v1beta`
    base_url: String,

    /// Model name without the `models/` prefix
    model: String,

    dimensions: usize,

    api_key: String,
}

impl GeminiProvider {
    /// Create a provider; `base_url` defaults to the public v1beta API.
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        dimensions: usize,
        api_key: &str,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Knowledge(format!("Failed to create HTTP client for Gemini: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
            api_key: api_key.to_string(),
        })
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to send request to Gemini: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Knowledge(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse Gemini response: {}", e)))?;

        if body.embedding.values.len() != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                body.embedding.values.len(),
                self.dimensions
            )));
        }

        debug!("Generated {} dimensional embedding", body.embedding.values.len());
        Ok(body.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::Knowledge("Cannot embed empty text".to_string()));
        }
        self.embed_single(text).await
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "gemini"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
