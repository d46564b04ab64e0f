//! OpenAI-compatible chat completions provider.
//!
//! Covers OpenAI itself and hosted runtimes exposing the same API, such as
//! Groq (`https://api.groq.com/openai/v1`). Responses are consumed as SSE.

use crate::client::{LlmClient, LlmCompletion, LlmEvent, LlmRequest, LlmStream, LlmUsage};
use crate::stream::{event_stream, FrameDecoder, LineOutcome};
use crate::types::{LlmMessage, ProviderType, Role, ToolCall, ToolDefinition};
use profrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

/// One SSE `data:` payload.
#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Accumulates SSE chunks into deltas, tool calls and the final completion.
#[derive(Debug)]
struct SseChatDecoder {
    model: String,
    content: String,
    calls: BTreeMap<usize, PartialToolCall>,
    usage: LlmUsage,
}

impl SseChatDecoder {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            content: String::new(),
            calls: BTreeMap::new(),
            usage: LlmUsage::default(),
        }
    }
}

impl FrameDecoder for SseChatDecoder {
    fn on_line(&mut self, line: &str) -> AppResult<LineOutcome> {
        let Some(data) = line.strip_prefix("data:") else {
            // event:, id:, retry: and comment lines carry nothing we use
            return Ok(LineOutcome::default());
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Ok(LineOutcome::terminal());
        }

        let payload: ChunkPayload = serde_json::from_str(data)
            .map_err(|e| AppError::Llm(format!("Failed to parse chunk: {}", e)))?;

        if let Some(error) = payload.error {
            return Err(AppError::Llm(format!("Provider stream error: {}", error)));
        }

        if !payload.model.is_empty() {
            self.model = payload.model;
        }
        if let Some(usage) = payload.usage {
            self.usage = LlmUsage::new(usage.prompt_tokens, usage.completion_tokens);
        }

        let mut events = Vec::new();
        for delta in payload.choices.into_iter().filter_map(|c| c.delta) {
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                events.push(LlmEvent::TextDelta(text));
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let partial = self.calls.entry(call.index).or_default();
                if let Some(id) = call.id {
                    partial.id = Some(id);
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
            }
        }

        Ok(LineOutcome::events(events))
    }

    fn finish(&mut self) -> AppResult<Vec<LlmEvent>> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for (index, partial) in std::mem::take(&mut self.calls) {
            let arguments = if partial.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&partial.arguments).map_err(|e| {
                    AppError::Llm(format!(
                        "Invalid arguments for tool '{}': {}",
                        partial.name, e
                    ))
                })?
            };

            tool_calls.push(ToolCall {
                id: partial.id.unwrap_or_else(|| format!("call_{}", index)),
                name: partial.name,
                arguments,
            });
        }

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

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiCompatibleClient {
    provider: ProviderType,

    /// Base URL, e.g. `https://api.groq.com/openai/v1`
    base_url: String,

    api_key: String,

    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    /// Create a client for `provider` against `base_url`.
    pub fn new(provider: ProviderType, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Groq client with the default endpoint.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new(
            ProviderType::Groq,
            ProviderType::Groq.default_endpoint(),
            api_key,
        )
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(WireMessage {
                role: Role::System.as_str(),
                content: Some(system.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        messages.extend(request.messages.iter().map(to_wire_message));

        let tools: Vec<WireTool> = request.tools.iter().map(WireTool::from).collect();
        let tool_choice = if tools.is_empty() { None } else { Some("auto") };

        ChatRequest {
            model: &request.model,
            messages,
            tools,
            tool_choice,
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

fn to_wire_message(message: &LlmMessage) -> WireMessage {
    let tool_calls: Vec<WireToolCall> = message
        .tool_calls
        .iter()
        .map(|call| WireToolCall {
            id: call.id.clone(),
            kind: "function",
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        })
        .collect();

    let content = if message.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role: message.role.as_str(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    #[instrument(skip(self, request), fields(provider = self.provider.as_str(), model = %request.model, tools = request.tools.len()))]
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming chat request");

        let body = self.to_chat_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
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
                "{} API error ({}): {}",
                self.provider.as_str(),
                status,
                error_text
            )));
        }

        Ok(event_stream(
            response.bytes_stream(),
            SseChatDecoder::new(&request.model),
        ))
    }
}
