//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime, through
//! its `/api/chat` endpoint. Ollama streams newline-delimited JSON objects.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmCompletion, LlmEvent, LlmRequest, LlmStream, LlmUsage};
use crate::stream::{event_stream, FrameDecoder, LineOutcome};
use crate::types::{LlmMessage, ProviderType, Role, ToolCall, ToolDefinition};
use profrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaToolFunction,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for OllamaTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: OllamaToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

/// One NDJSON line of a streaming chat response.
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
struct NdjsonChatDecoder {
    model: String,
    content: String,
    tool_calls: Vec<ToolCall>,
    usage: LlmUsage,
}

impl NdjsonChatDecoder {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            content: String::new(),
            tool_calls: Vec::new(),
            usage: LlmUsage::default(),
        }
    }
}

impl FrameDecoder for NdjsonChatDecoder {
    fn on_line(&mut self, line: &str) -> AppResult<LineOutcome> {
        let chunk: OllamaChatChunk = serde_json::from_str(line)
            .map_err(|e| AppError::Llm(format!("Failed to parse chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(AppError::Llm(format!("Ollama stream error: {}", error)));
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model;
        }

        let mut events = Vec::new();
        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                self.content.push_str(&message.content);
                events.push(LlmEvent::TextDelta(message.content));
            }
            for call in message.tool_calls {
                // Ollama does not assign call ids
                let id = format!("call_{}", self.tool_calls.len());
                let arguments = match call.function.arguments {
                    serde_json::Value::Null => serde_json::json!({}),
                    other => other,
                };
                self.tool_calls.push(ToolCall {
                    id,
                    name: call.function.name,
                    arguments,
                });
            }
        }

        if chunk.done {
            self.usage = LlmUsage::new(
                chunk.prompt_eval_count.unwrap_or(0),
                chunk.eval_count.unwrap_or(0),
            );
            let mut outcome = LineOutcome::terminal();
            outcome.events = events;
            return Ok(outcome);
        }

        Ok(LineOutcome::events(events))
    }

    fn finish(&mut self) -> AppResult<Vec<LlmEvent>> {
        let tool_calls = std::mem::take(&mut self.tool_calls);
        let mut events: Vec<LlmEvent> = tool_calls.iter().cloned().map(LlmEvent::ToolCall).collect();
        events.push(LlmEvent::Done(LlmCompletion {
            content: std::mem::take(&mut self.content),
            model: self.model.clone(),
            tool_calls,
            usage: self.usage.clone(),
        }));
        Ok(events)
    }
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(ProviderType::Ollama.default_endpoint())
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(OllamaMessage {
                role: Role::System.as_str().to_string(),
                content: system.clone(),
                tool_calls: Vec::new(),
            });
        }
        messages.extend(request.messages.iter().map(to_ollama_message));

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            tools: request.tools.iter().map(OllamaTool::from).collect(),
            stream: true,
            options,
        }
    }
}

fn to_ollama_message(message: &LlmMessage) -> OllamaMessage {
    OllamaMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| OllamaToolCall {
                function: OllamaFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect(),
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!(model = %request.model, "Starting streaming request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send streaming request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(event_stream(
            response.bytes_stream(),
            NdjsonChatDecoder::new(&request.model),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("llama3", vec![LlmMessage::user("Hello")])
            .with_system("sys")
            .with_temperature(0.7)
            .with_max_tokens(100);

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(ollama_req.model, "llama3");
        assert_eq!(ollama_req.messages.len(), 2);
        assert_eq!(ollama_req.messages[0].role, "system");
        assert_eq!(ollama_req.messages[1].content, "Hello");
        assert!(ollama_req.stream);
        let options = ollama_req.options.unwrap();
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.num_predict, Some(100));
    }

    #[tokio::test]
    async fn test_stream_ndjson_with_tool_call() {
        let mut server = mockito::Server::new_async().await;
        let body = [
            serde_json::json!({"model": "llama3.1", "message": {"role": "assistant", "content": "", "tool_calls": [{"function": {"name": "queryVectorStore", "arguments": {"query": "chemistry"}}}]}, "done": false}),
            serde_json::json!({"model": "llama3.1", "message": {"role": "assistant", "content": ""}, "done": true, "prompt_eval_count": 12, "eval_count": 4}),
        ]
        .iter()
        .map(|v| format!("{}\n", v))
        .collect::<String>();

        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url());
        let request = LlmRequest::new("llama3.1", vec![LlmMessage::user("chemistry?")]);
        let events: Vec<LlmEvent> = client
            .stream(&request)
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            LlmEvent::ToolCall(call) => {
                assert_eq!(call.id, "call_0");
                assert_eq!(call.str_arg("query"), Some("chemistry"));
            }
            other => panic!("expected tool call, got {:?}", other),
        }
        match &events[1] {
            LlmEvent::Done(done) => assert_eq!(done.usage.total_tokens, 16),
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_text() {
        let mut server = mockito::Server::new_async().await;
        let body = "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n\
                    {\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"!\"},\"done\":true}\n";
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url());
        let request = LlmRequest::new("llama3", vec![LlmMessage::user("Hello")]);
        let completion = client.complete(&request).await.unwrap();
        assert_eq!(completion.content, "Hi!");
        assert!(completion.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_line() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body("{\"error\":\"model not found\"}\n")
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url());
        let request = LlmRequest::new("missing", vec![LlmMessage::user("Hello")]);
        assert!(client.complete(&request).await.is_err());
    }
}
