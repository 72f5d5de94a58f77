//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, TrigramProvider};
use sensai_core::config::{LlmSettings, RagSettings};
use sensai_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Embed several texts, one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Llm("No embedding returned".to_string()))
    }
}

/// Create the embedding provider named by `rag.embeddingProvider`.
///
/// The Ollama provider reuses the generator's endpoint and timeout.
pub fn create_provider(
    rag: &RagSettings,
    llm: &LlmSettings,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match rag.embedding_provider.to_lowercase().as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            &llm.endpoint,
            &rag.embedding_model,
            rag.embedding_dimensions,
            Duration::from_secs(llm.timeout_secs),
        )?)),
        "trigram" => Ok(Arc::new(TrigramProvider::new(rag.embedding_dimensions))),
        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            rag.embedding_provider
        ))),
    }
}
