//! Prompt loader.
//!
//! Prompts resolve in two places: a workspace override at
//! `.sensai/prompts/<id>.yml`, then the definitions compiled into this crate.

use crate::types::PromptDefinition;
use sensai_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the answer-generation prompt.
pub const ANSWER_PROMPT_ID: &str = "sensai.answer";

/// Identifier of the key-point extraction prompt.
pub const KEY_POINTS_PROMPT_ID: &str = "sensai.key_points";

const BUILTIN_PROMPTS: [(&str, &str); 2] = [
    (ANSWER_PROMPT_ID, include_str!("../prompts/sensai.answer.yml")),
    (KEY_POINTS_PROMPT_ID, include_str!("../prompts/sensai.key_points.yml")),
];

/// Load a prompt definition by ID.
///
/// # Example
/// ```no_run
/// use sensai_prompt::{load_prompt, ANSWER_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), ANSWER_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".sensai/prompts")
        .join(format!("{}.yml", prompt_id));

    let definition = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        parse_prompt(&contents, &prompt_file.display().to_string())?
    } else {
        let (_, contents) = BUILTIN_PROMPTS
            .iter()
            .find(|(id, _)| *id == prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;
        parse_prompt(contents, prompt_id)?
    };

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file declares id '{}' but was loaded as '{}'",
            definition.id, prompt_id
        )));
    }

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);
    Ok(definition)
}

/// List prompt IDs: built-ins first, then workspace-only overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPTS.iter().map(|(id, _)| id.to_string()).collect();

    let prompts_dir = workspace_path.join(".sensai/prompts");
    if !prompts_dir.exists() {
        return Ok(prompt_ids);
    }

    for entry in walkdir::WalkDir::new(&prompts_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !prompt_ids.iter().any(|id| id == stem) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    Ok(prompt_ids)
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;
    validate_prompt(&definition)?;
    Ok(definition)
}

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
