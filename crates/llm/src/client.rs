//! LLM client abstraction and request/response types.
//!
//! A chat request carries the full message history plus the tools the model
//! may call this turn. Responses arrive as a stream of [`LlmEvent`]s that
//! always ends with exactly one [`LlmEvent::Done`].

use crate::types::{LlmMessage, ToolCall, ToolDefinition};
use futures::{Stream, StreamExt};
use profrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model identifier (e.g., "llama3-8b-8192")
    pub model: String,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Conversation history, oldest first
    pub messages: Vec<LlmMessage>,

    /// Tools offered for this request; empty means none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new request for `model` over `messages`.
    pub fn new(model: impl Into<String>, messages: Vec<LlmMessage>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Terminal payload of a response stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmCompletion {
    /// Concatenation of every text delta
    pub content: String,

    /// Model that produced the response
    pub model: String,

    /// Tool calls requested by the model, in order
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    pub usage: LlmUsage,
}

/// One event of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Incremental response text
    TextDelta(String),

    /// The model asks for a tool to be run
    ToolCall(ToolCall),

    /// End of the response
    Done(LlmCompletion),
}

/// Stream of LLM events.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmEvent>> + Send>>;

/// Trait for LLM providers.
///
/// This trait abstracts the hosted model API (Groq, OpenAI, Ollama)
/// and provides a unified streaming interface.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "groq").
    fn provider_name(&self) -> &str;

    /// Perform a streaming chat completion.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;

    /// Perform a completion and wait for the final payload.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmCompletion> {
        let mut stream = self.stream(request).await?;
        while let Some(event) = stream.next().await {
            if let LlmEvent::Done(completion) = event? {
                return Ok(completion);
            }
        }
        Err(AppError::Llm(
            "Response stream ended without a completion".to_string(),
        ))
    }
}
