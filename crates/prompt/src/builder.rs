//! Prompt builder for rendering templates.

use crate::loader::{list_prompts, resolve_prompt};
use crate::types::{
    PromptDefinition, PromptSource, EVIDENCE_PROMPT_ID, RETRIEVAL_TOOL_PROMPT_ID,
    SYSTEM_PROMPT_ID,
};
use handlebars::Handlebars;
use profrag_core::{AppError, AppResult};
use serde::Serialize;
use std::path::Path;

/// Name under which the retrieval tool is exposed to the model.
pub const RETRIEVAL_TOOL_NAME: &str = "queryVectorStore";

/// Render a Handlebars template with `data`.
pub fn render_template<T: Serialize>(template: &str, data: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// The prompts one chat turn needs, resolved once per process.
#[derive(Debug, Clone)]
pub struct PromptSet {
    system: PromptDefinition,
    retrieval_tool: PromptDefinition,
    evidence: PromptDefinition,
}

impl PromptSet {
    /// Resolve every prompt, applying workspace overrides when present.
    pub fn load(workspace_path: Option<&Path>) -> AppResult<Self> {
        let resolve = |id: &str| -> AppResult<PromptDefinition> {
            let (definition, source) = resolve_prompt(workspace_path, id)?;
            if source == PromptSource::Workspace {
                tracing::info!(prompt = %id, "Using workspace prompt override");
            }
            Ok(definition)
        };

        if let Some(workspace) = workspace_path {
            let known = [SYSTEM_PROMPT_ID, RETRIEVAL_TOOL_PROMPT_ID, EVIDENCE_PROMPT_ID];
            for id in list_prompts(workspace)? {
                if !known.contains(&id.as_str()) {
                    tracing::warn!(prompt = %id, "Ignoring unknown prompt file");
                }
            }
        }

        Ok(Self {
            system: resolve(SYSTEM_PROMPT_ID)?,
            retrieval_tool: resolve(RETRIEVAL_TOOL_PROMPT_ID)?,
            evidence: resolve(EVIDENCE_PROMPT_ID)?,
        })
    }

    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        Self::load(None)
    }

    /// Rendered system prompt.
    pub fn system_prompt(&self) -> AppResult<String> {
        render_template(
            &self.system.template,
            &serde_json::json!({ "toolName": RETRIEVAL_TOOL_NAME }),
        )
    }

    /// Description shown to the model for the retrieval tool.
    pub fn retrieval_tool_description(&self) -> &str {
        self.retrieval_tool.template.trim()
    }

    /// JSON Schema of the retrieval tool arguments.
    pub fn retrieval_tool_parameters(&self) -> serde_json::Value {
        let query_description = self
            .retrieval_tool
            .parameter("query")
            .unwrap_or("Search query");

        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": query_description,
                }
            },
            "required": ["query"],
        })
    }

    /// Format retrieved matches into the text returned to the model.
    ///
    /// `matches` must serialize to objects with `professor`, `subject`,
    /// `starRating` and `reviewComment` fields.
    pub fn render_evidence<T: Serialize>(&self, matches: &[T]) -> AppResult<String> {
        render_template(
            &self.evidence.template,
            &serde_json::json!({ "matches": matches }),
        )
    }
}
