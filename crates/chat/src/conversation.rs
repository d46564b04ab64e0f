//! Conversation records: messages, tool results and persisted chats.

use chrono::{DateTime, Utc};
use profrag_knowledge::ScoredMatch;
use serde::{Deserialize, Serialize};

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
    System,
}

/// Output of one tool call, kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_name: String,
    pub tool_call_id: String,

    /// Arguments the model called the tool with
    #[serde(default)]
    pub arguments: serde_json::Value,

    pub result: Vec<ScoredMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum MessageContent {
    Text(String),
    ToolResults(Vec<ToolResult>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::ToolResults(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    fn new(role: ChatRole, content: MessageContent) -> Self {
        Self {
            id: new_id(),
            role,
            content,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ChatRole::System, MessageContent::Text(text.into()))
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::new(ChatRole::Tool, MessageContent::ToolResults(results))
    }
}

/// A persisted chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub chat_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub path: String,
}

impl Conversation {
    pub fn new(
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        messages: Vec<ChatMessage>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let chat_id = chat_id.into();
        let title = messages
            .first()
            .and_then(|m| m.content.as_text())
            .map(title_from)
            .unwrap_or_default();

        Self {
            path: chat_path(&chat_id),
            chat_id,
            user_id: user_id.into(),
            title,
            created_at,
            messages,
        }
    }
}

/// Fresh identifier for chats and messages.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn chat_path(chat_id: &str) -> String {
    format!("/chat/{}", chat_id)
}

/// First [`TITLE_MAX_CHARS`] characters of `text`.
pub fn title_from(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}
