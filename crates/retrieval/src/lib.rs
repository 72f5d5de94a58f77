//! Hybrid retrieval for SENSAI.
//!
//! Taxonomy-aware query analysis, a cascade of structural and semantic
//! lookups over a document store, context formatting and the response
//! orchestration that feeds an LLM.

pub mod analyzer;
pub mod embeddings;
pub mod engine;
pub mod format;
pub mod generator;
pub mod import;
pub mod orchestrator;
pub mod store;
pub mod taxonomy;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use analyzer::{QueryAnalysis, QueryAnalyzer};
pub use engine::{CascadePolicy, Retrieval, RetrievalEngine, Strategy};
pub use format::{format_context, normalized_relevance, NO_RELEVANT_DOCUMENT};
pub use generator::{extract_key_points_to_file, LlmKeyPointExtractor, LlmResponseGenerator};
pub use import::{import_path, ImportStats};
pub use orchestrator::{
    EnrichmentPolicy, KeyPointExtractor, OrchestratedResponse, ResponseGenerator,
    ResponseOrchestrator, SourceRef,
};
pub use store::{DocumentStore, InMemoryStore, MetadataField, SqliteStore};
pub use taxonomy::{ConceptRef, LevelRef, SpecialityRef, Taxonomy};
pub use types::{ChatMessage, Passage, PassageMetadata, ScoredPassage};

use sensai_core::config::AppConfig;
use sensai_core::{AppError, AppResult};
use std::sync::Arc;

/// Built-in taxonomy, or the `rag.taxonomyFile` override. Malformed data is
/// fatal.
pub fn load_taxonomy(config: &AppConfig) -> AppResult<Arc<Taxonomy>> {
    let taxonomy = Taxonomy::load(config.taxonomy_path().as_deref())?;
    tracing::debug!(
        "Taxonomy loaded: {} subjects, {} levels, {} indexed concepts",
        taxonomy.subjects().len(),
        taxonomy.levels().len(),
        taxonomy.concept_index().len()
    );
    Ok(Arc::new(taxonomy))
}

/// Open the configured SQLite store for `rag.collection`.
pub fn open_store(config: &AppConfig) -> AppResult<Arc<SqliteStore>> {
    let embedder = embeddings::create_provider(&config.rag, &config.llm)?;
    let store = SqliteStore::open(&config.index_path(), &config.rag.collection, embedder)?;
    Ok(Arc::new(store))
}

/// Retrieval engine over `store` with the configured K and cascade policy.
pub fn build_engine(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
) -> AppResult<RetrievalEngine> {
    let taxonomy = load_taxonomy(config)?;
    let policy: CascadePolicy = config.rag.cascade.parse()?;
    Ok(RetrievalEngine::new(store, QueryAnalyzer::new(taxonomy), config.rag.top_k).with_policy(policy))
}

fn create_llm_client(config: &AppConfig) -> AppResult<Arc<dyn sensai_llm::LlmClient>> {
    sensai_llm::create_client(
        &config.llm.provider,
        Some(&config.llm.endpoint),
        config.llm.timeout_secs,
    )
    .map_err(|e| AppError::Llm(format!("Failed to create LLM client: {}", e)))
}

fn key_point_extractor(
    config: &AppConfig,
    client: Arc<dyn sensai_llm::LlmClient>,
) -> AppResult<LlmKeyPointExtractor> {
    LlmKeyPointExtractor::from_workspace(
        client,
        &config.workspace,
        config.llm.clone(),
        config.enrichment.max_document_chars,
    )
}

/// Standalone key-point extractor, as used by `sensai key-points`.
pub fn build_key_point_extractor(config: &AppConfig) -> AppResult<LlmKeyPointExtractor> {
    key_point_extractor(config, create_llm_client(config)?)
}

/// Orchestrator with LLM-backed generator and, when enabled, key-point
/// extractor sharing one client.
pub fn build_orchestrator(
    config: &AppConfig,
    engine: Arc<RetrievalEngine>,
) -> AppResult<ResponseOrchestrator> {
    let client = create_llm_client(config)?;

    let generator =
        LlmResponseGenerator::from_workspace(client.clone(), &config.workspace, config.llm.clone())?;
    let orchestrator = ResponseOrchestrator::new(engine, Arc::new(generator));

    if !config.enrichment.enabled {
        return Ok(orchestrator);
    }

    let extractor = key_point_extractor(config, client)?;
    Ok(orchestrator.with_key_points(
        Arc::new(extractor),
        EnrichmentPolicy::from(&config.enrichment),
    ))
}
