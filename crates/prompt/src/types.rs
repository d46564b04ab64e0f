//! Prompt types.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of the chat system prompt.
pub const SYSTEM_PROMPT_ID: &str = "chat.system";

/// Identifier of the retrieval tool description.
pub const RETRIEVAL_TOOL_PROMPT_ID: &str = "tool.queryVectorStore";

/// Identifier of the evidence block template.
pub const EVIDENCE_PROMPT_ID: &str = "evidence.block";

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Descriptions of named parameters, used by tool prompts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl PromptDefinition {
    /// Description of a named parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Where a resolved prompt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// Compiled-in default
    Builtin,

    /// `.profrag/prompts/<id>.yml` in the workspace
    Workspace,
}
