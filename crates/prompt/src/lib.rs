//! Prompt system for profrag.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Handlebars template rendering
//! - Built-in defaults overridable from `.profrag/prompts/`

pub mod builder;
mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{render_template, PromptSet, RETRIEVAL_TOOL_NAME};
pub use loader::{list_prompts, load_builtin, load_prompt, resolve_prompt};
pub use types::{
    PromptDefinition, PromptSource, EVIDENCE_PROMPT_ID, RETRIEVAL_TOOL_PROMPT_ID,
    SYSTEM_PROMPT_ID,
};
