//! LLM provider factory.
//!
//! Builds the client for the configured provider, injecting the endpoint and
//! the already-resolved API key.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatibleClient};
use crate::types::ProviderType;
use profrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("groq", "openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, mandatory for hosted providers
///
/// # Errors
/// Returns [`AppError::Config`] if the provider is unknown or a required key
/// is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
        ProviderType::Groq | ProviderType::OpenAi => {
            let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                AppError::Config(format!(
                    "Provider '{}' requires an API key",
                    provider_type.as_str()
                ))
            })?;
            tracing::debug!(provider = provider_type.as_str(), %base_url, "Creating OpenAI-compatible client");
            Ok(Arc::new(OpenAiCompatibleClient::new(
                provider_type,
                base_url,
                api_key,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_groq_client() {
        let client = create_client("groq", None, Some("gsk_test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_groq_requires_api_key() {
        match create_client("groq", None, None) {
            Err(err) => assert!(err.to_string().contains("requires an API key")),
            Ok(_) => panic!("Expected error for Groq without API key"),
        }
    }

    #[test]
    fn test_openai_rejects_empty_key() {
        assert!(create_client("openai", None, Some("")).is_err());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
