//! Prompt loader for YAML prompt definitions.
//!
//! Workspace files under `.profrag/prompts/` override the built-in defaults.

use crate::defaults::{builtin_ids, builtin_source};
use crate::types::{PromptDefinition, PromptSource};
use profrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Directory holding prompt overrides inside a workspace.
pub fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".profrag/prompts")
}

/// Load a prompt definition by ID from the workspace.
///
/// This function searches for a prompt file named `<id>.yml` in the
/// `.profrag/prompts/` directory.
///
/// # Example
/// ```no_run
/// use profrag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "chat.system")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents)
        .map_err(|e| AppError::Prompt(format!("{:?}: {}", prompt_file, e)))?;

    if definition.id != prompt_id {
        tracing::warn!(
            file_id = %prompt_id,
            declared_id = %definition.id,
            "Prompt id does not match its file name"
        );
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load the built-in definition of `prompt_id`.
pub fn load_builtin(prompt_id: &str) -> AppResult<PromptDefinition> {
    let source = builtin_source(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown built-in prompt: {}", prompt_id)))?;
    parse_prompt(source)
}

/// Resolve a prompt, preferring a workspace override over the built-in.
///
/// A broken override is an error rather than a silent fallback.
pub fn resolve_prompt(
    workspace_path: Option<&Path>,
    prompt_id: &str,
) -> AppResult<(PromptDefinition, PromptSource)> {
    if let Some(workspace) = workspace_path {
        let override_file = prompts_dir(workspace).join(format!("{}.yml", prompt_id));
        if override_file.exists() {
            return Ok((load_prompt(workspace, prompt_id)?, PromptSource::Workspace));
        }
    }

    Ok((load_builtin(prompt_id)?, PromptSource::Builtin))
}

/// List all available prompt IDs: built-ins plus workspace files.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin_ids().iter().map(|id| id.to_string()).collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
