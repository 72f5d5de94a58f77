//! LLM-backed collaborators for the orchestrator.

use crate::orchestrator::{KeyPointExtractor, ResponseGenerator};
use sensai_core::config::LlmSettings;
use sensai_core::AppResult;
use sensai_llm::{LlmClient, LlmRequest};
use sensai_prompt::{build_prompt, load_prompt, PromptDefinition, ANSWER_PROMPT_ID, KEY_POINTS_PROMPT_ID};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn request_for(prompt: sensai_prompt::BuiltPrompt, settings: &LlmSettings) -> LlmRequest {
    let mut request = LlmRequest::new(prompt.user, &settings.model)
        .with_max_tokens(settings.max_tokens)
        .with_temperature(settings.temperature)
        .with_top_p(settings.top_p);
    if let Some(system) = prompt.system {
        request = request.with_system(system);
    }
    request
}

/// Renders the answer prompt and sends it to the LLM.
pub struct LlmResponseGenerator {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: LlmSettings,
}

impl LlmResponseGenerator {
    pub fn new(client: Arc<dyn LlmClient>, prompt: PromptDefinition, settings: LlmSettings) -> Self {
        Self {
            client,
            prompt,
            settings,
        }
    }

    /// Use the workspace's `sensai.answer` prompt (or the built-in one).
    pub fn from_workspace(
        client: Arc<dyn LlmClient>,
        workspace: &Path,
        settings: LlmSettings,
    ) -> AppResult<Self> {
        let prompt = load_prompt(workspace, ANSWER_PROMPT_ID)?;
        Ok(Self::new(client, prompt, settings))
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn generate(&self, question: &str, context: &str, history: &str) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), context.to_string());
        variables.insert("history".to_string(), history.to_string());

        let built = build_prompt(&self.prompt, variables)?;
        tracing::debug!(
            "Calling {} with prompt '{}' ({} chars)",
            self.client.provider_name(),
            built.metadata.source_prompt_id,
            built.user.len()
        );

        let response = self.client.complete(&request_for(built, &self.settings)).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Summarises the top passage with the `sensai.key_points` prompt.
pub struct LlmKeyPointExtractor {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: LlmSettings,
    max_document_chars: usize,
}

impl LlmKeyPointExtractor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: LlmSettings,
        max_document_chars: usize,
    ) -> Self {
        Self {
            client,
            prompt,
            settings,
            max_document_chars,
        }
    }

    pub fn from_workspace(
        client: Arc<dyn LlmClient>,
        workspace: &Path,
        settings: LlmSettings,
        max_document_chars: usize,
    ) -> AppResult<Self> {
        let prompt = load_prompt(workspace, KEY_POINTS_PROMPT_ID)?;
        Ok(Self::new(client, prompt, settings, max_document_chars))
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_document(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[async_trait::async_trait]
impl KeyPointExtractor for LlmKeyPointExtractor {
    async fn extract_key_points(&self, document: &str) -> AppResult<String> {
        if document.chars().count() > self.max_document_chars {
            tracing::warn!(
                "Document truncated to {} characters for key-point extraction",
                self.max_document_chars
            );
        }
        let document = truncate_document(document, self.max_document_chars);

        let mut variables = HashMap::new();
        variables.insert("document".to_string(), document);
        let built = build_prompt(&self.prompt, variables)?;

        let response = self.client.complete(&request_for(built, &self.settings)).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Extracts key points from a curriculum file and writes them to
/// `<output_dir>/<stem>_key_points.md`, creating the directory if needed.
pub async fn extract_key_points_to_file(
    extractor: &dyn KeyPointExtractor,
    document_path: &Path,
    output_dir: &Path,
) -> AppResult<PathBuf> {
    let content = tokio::fs::read_to_string(document_path).await?;
    let key_points = extractor.extract_key_points(&content).await?;

    let stem = document_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    tokio::fs::create_dir_all(output_dir).await?;
    let output_path = output_dir.join(format!("{}_key_points.md", stem));
    tokio::fs::write(&output_path, key_points).await?;

    tracing::info!("Key points saved to {:?}", output_path);
    Ok(output_path)
}
