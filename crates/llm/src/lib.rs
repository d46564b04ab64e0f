//! LLM integration crate for profrag.
//!
//! This crate provides a provider-agnostic abstraction for streaming chat
//! completions with tool calling. It supports multiple providers through a
//! unified trait-based interface.
//!
//! # Providers
//! - **Groq** (default) and **OpenAI**: OpenAI-compatible SSE API
//! - **Ollama**: Local LLM runtime, NDJSON API
//!
//! # Example
//! ```no_run
//! use profrag_llm::{LlmClient, LlmMessage, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("llama3", vec![LlmMessage::user("Hello, world!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
mod stream;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmCompletion, LlmEvent, LlmRequest, LlmStream, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatibleClient};
pub use types::{LlmMessage, ProviderType, Role, ToolCall, ToolDefinition};
