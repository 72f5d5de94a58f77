//! Response Orchestrator.
//!
//! Ties one request together: cascade retrieval, context formatting,
//! optional key-point enrichment of the top passage, history rendering and
//! the final call to the response generator. History arrives with each
//! request; nothing is retained between calls.

use crate::analyzer::QueryAnalysis;
use crate::engine::{RetrievalEngine, Strategy};
use crate::format::{display_name, format_context, normalized_relevance};
use crate::types::{ChatMessage, Passage};
use sensai_core::config::EnrichmentSettings;
use sensai_core::AppResult;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Header placed before the extracted key points.
pub const KEY_POINTS_HEADER: &str = "\n\nPoints clés du programme :\n";

const STUDENT_PREFIX: &str = "Élève: ";
const ASSISTANT_PREFIX: &str = "SENS AI: ";

/// Produces the final answer from the question, the formatted context and
/// the rendered history.
#[async_trait::async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str, history: &str) -> AppResult<String>;
}

/// Summarises a curriculum passage into key points.
#[async_trait::async_trait]
pub trait KeyPointExtractor: Send + Sync {
    async fn extract_key_points(&self, document: &str) -> AppResult<String>;
}

/// When the top passage is worth summarising.
#[derive(Debug, Clone)]
pub struct EnrichmentPolicy {
    pub enabled: bool,
    pub min_query_tokens: usize,
    pub min_passage_chars: usize,
    pub trigger_words: Vec<String>,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self::from(&EnrichmentSettings::default())
    }
}

impl From<&EnrichmentSettings> for EnrichmentPolicy {
    fn from(settings: &EnrichmentSettings) -> Self {
        Self {
            enabled: settings.enabled,
            min_query_tokens: settings.min_query_tokens,
            min_passage_chars: settings.min_passage_chars,
            trigger_words: settings
                .trigger_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }
}

impl EnrichmentPolicy {
    /// The query is long enough and contains a trigger word.
    pub fn query_qualifies(&self, query: &str) -> bool {
        if !self.enabled || query.split_whitespace().count() <= self.min_query_tokens {
            return false;
        }
        let lower = query.to_lowercase();
        self.trigger_words
            .iter()
            .any(|word| lower.contains(word.as_str()))
    }

    pub fn passage_qualifies(&self, passage: &Passage) -> bool {
        passage.text.chars().count() >= self.min_passage_chars
    }
}

/// Where an answer came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub name: String,
    pub score: f32,
    pub relevance: f32,
}

/// Answer together with the retrieval that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedResponse {
    pub answer: String,
    pub strategy: Strategy,
    pub analysis: QueryAnalysis,
    pub sources: Vec<SourceRef>,
    pub enriched: bool,
}

pub struct ResponseOrchestrator {
    engine: Arc<RetrievalEngine>,
    generator: Arc<dyn ResponseGenerator>,
    extractor: Option<Arc<dyn KeyPointExtractor>>,
    enrichment: EnrichmentPolicy,
}

impl ResponseOrchestrator {
    pub fn new(engine: Arc<RetrievalEngine>, generator: Arc<dyn ResponseGenerator>) -> Self {
        Self {
            engine,
            generator,
            extractor: None,
            enrichment: EnrichmentPolicy::default(),
        }
    }

    /// Enable key-point enrichment with `extractor`.
    pub fn with_key_points(
        mut self,
        extractor: Arc<dyn KeyPointExtractor>,
        policy: EnrichmentPolicy,
    ) -> Self {
        self.extractor = Some(extractor);
        self.enrichment = policy;
        self
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    pub async fn respond(&self, query: &str, history: &[ChatMessage]) -> AppResult<String> {
        Ok(self.respond_with_provenance(query, history).await?.answer)
    }

    pub async fn respond_with_provenance(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> AppResult<OrchestratedResponse> {
        let retrieval = self.engine.retrieve(query).await.map_err(|e| {
            error!("Document store failure during retrieval: {}", e);
            e
        })?;

        let mut context = format_context(&retrieval.results);
        let mut enriched = false;
        if let Some(key_points) = self.key_points(query, retrieval.top_passage()).await {
            context.push_str(KEY_POINTS_HEADER);
            context.push_str(&key_points);
            enriched = true;
        }

        let history_text = render_history(history);
        debug!(
            context_chars = context.chars().count(),
            history_turns = history.len().saturating_sub(1),
            "Generating answer"
        );

        let answer = self
            .generator
            .generate(query, &context, &history_text)
            .await
            .map_err(|e| {
                error!("Response generation failed: {}", e);
                e
            })?;

        info!(
            strategy = %retrieval.strategy,
            sources = retrieval.results.len(),
            enriched,
            "Answer generated"
        );

        let sources = retrieval
            .results
            .iter()
            .map(|(passage, score)| SourceRef {
                source: passage.metadata.source.clone(),
                name: display_name(passage),
                score: *score,
                relevance: normalized_relevance(*score),
            })
            .collect();

        Ok(OrchestratedResponse {
            answer,
            strategy: retrieval.strategy,
            analysis: retrieval.analysis,
            sources,
            enriched,
        })
    }

    /// Key points of the top passage, or `None` when enrichment does not
    /// apply or the extractor failed.
    async fn key_points(&self, query: &str, top: Option<&Passage>) -> Option<String> {
        let extractor = self.extractor.as_ref()?;
        if !self.enrichment.query_qualifies(query) {
            return None;
        }

        let passage = top?;
        if !self.enrichment.passage_qualifies(passage) {
            debug!("Top passage too short for key-point extraction");
            return None;
        }

        match extractor.extract_key_points(&passage.text).await {
            Ok(points) if points.trim().is_empty() => None,
            Ok(points) => Some(points),
            Err(e) => {
                warn!("Key-point extraction failed, answering without it: {}", e);
                None
            }
        }
    }
}

/// Every message but the last, one `Élève:` / `SENS AI:` line each.
/// The last message is the current question, passed separately.
pub fn render_history(messages: &[ChatMessage]) -> String {
    let previous = match messages.split_last() {
        Some((_, previous)) => previous,
        None => return String::new(),
    };

    previous
        .iter()
        .map(|m| {
            let prefix = if m.is_user() {
                STUDENT_PREFIX
            } else {
                ASSISTANT_PREFIX
            };
            format!("{}{}", prefix, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
