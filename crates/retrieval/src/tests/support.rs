//! Test doubles shared by the scenario tests.

use crate::analyzer::QueryAnalyzer;
use crate::engine::{CascadePolicy, RetrievalEngine};
use crate::orchestrator::{KeyPointExtractor, ResponseGenerator};
use crate::store::{DocumentStore, MetadataField};
use crate::taxonomy::Taxonomy;
use crate::types::{Passage, ScoredPassage};
use sensai_core::{AppError, AppResult};
use std::sync::{Arc, Mutex};

/// One call received by the recording store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Metadata(String),
    Semantic(String),
}

/// Document store that records every call. Metadata lookups filter the
/// configured passages by source; semantic searches return the configured
/// list unchanged.
pub struct RecordingStore {
    passages: Vec<Passage>,
    semantic_hits: Vec<ScoredPassage>,
    fail: bool,
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            semantic_hits: Vec::new(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn with_semantic_hits(mut self, hits: Vec<ScoredPassage>) -> Self {
        self.semantic_hits = hits;
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: StoreCall) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(AppError::Store("index unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn find_by_metadata_substring(
        &self,
        field: MetadataField,
        needle: &str,
        limit: usize,
    ) -> AppResult<Vec<Passage>> {
        self.record(StoreCall::Metadata(needle.to_string()))?;
        let needle = needle.to_lowercase();
        Ok(self
            .passages
            .iter()
            .filter(|p| field.matches(p, &needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn semantic_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredPassage>> {
        self.record(StoreCall::Semantic(query.to_string()))?;
        Ok(self.semantic_hits.iter().take(k).cloned().collect())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.passages.len())
    }
}

pub fn engine(store: Arc<RecordingStore>, policy: CascadePolicy) -> RetrievalEngine {
    let taxonomy = Arc::new(Taxonomy::builtin().unwrap());
    RetrievalEngine::new(store, QueryAnalyzer::new(taxonomy), 5).with_policy(policy)
}

/// Curriculum passages tagged by file name.
pub fn curriculum() -> Vec<Passage> {
    vec![
        Passage::new(
            "La cellule est l'unité du vivant.",
            "programmes/svt_Seconde.pdf",
        ),
        Passage::new(
            "Théorème de Pythagore et théorème de Thalès : énoncés et réciproques.",
            "programmes/maths_3ème_cycle4.pdf",
        )
        .with_page(14),
        Passage::new(
            "La conscience, l'inconscient, la liberté.",
            "programmes/philosophie_Tle.pdf",
        ),
    ]
}

/// Generator that echoes nothing and keeps the inputs it was given.
#[derive(Default)]
pub struct RecordingGenerator {
    pub inputs: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl RecordingGenerator {
    pub fn last_context(&self) -> String {
        self.inputs.lock().unwrap().last().unwrap().1.clone()
    }

    pub fn last_history(&self) -> String {
        self.inputs.lock().unwrap().last().unwrap().2.clone()
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for RecordingGenerator {
    async fn generate(&self, question: &str, context: &str, history: &str) -> AppResult<String> {
        self.inputs.lock().unwrap().push((
            question.to_string(),
            context.to_string(),
            history.to_string(),
        ));
        if self.fail {
            return Err(AppError::Llm("model not loaded".to_string()));
        }
        Ok(format!("Réponse à : {}", question))
    }
}

/// Extractor returning a fixed result and counting calls.
pub struct StubExtractor {
    pub result: Result<String, String>,
    pub calls: Mutex<usize>,
}

impl StubExtractor {
    pub fn ok(points: &str) -> Self {
        Self {
            result: Ok(points.to_string()),
            calls: Mutex::new(0),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl KeyPointExtractor for StubExtractor {
    async fn extract_key_points(&self, _document: &str) -> AppResult<String> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone().map_err(AppError::Llm)
    }
}
