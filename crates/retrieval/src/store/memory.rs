//! In-memory document store.

use super::{cosine_distance, rank_by_distance, DocumentStore, MetadataField};
use crate::embeddings::EmbeddingProvider;
use crate::types::{Passage, ScoredPassage};
use sensai_core::{AppError, AppResult};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
struct StoredPassage {
    passage: Passage,
    embedding: Vec<f32>,
}

/// Vector store held in a `RwLock<Vec<_>>`; suits tests and small corpora.
#[derive(Debug)]
pub struct InMemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<StoredPassage>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and append a passage.
    pub async fn add(&self, passage: Passage) -> AppResult<()> {
        let embedding = self.embedder.embed(&passage.text).await?;
        self.add_with_embedding(passage, embedding)
    }

    /// Append a passage with a precomputed embedding.
    pub fn add_with_embedding(&self, passage: Passage, embedding: Vec<f32>) -> AppResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Store("In-memory store lock poisoned".to_string()))?;
        entries.push(StoredPassage { passage, embedding });
        Ok(())
    }

    fn snapshot(&self) -> AppResult<std::sync::RwLockReadGuard<'_, Vec<StoredPassage>>> {
        self.entries
            .read()
            .map_err(|_| AppError::Store("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_by_metadata_substring(
        &self,
        field: MetadataField,
        needle: &str,
        limit: usize,
    ) -> AppResult<Vec<Passage>> {
        let needle = needle.to_lowercase();
        let entries = self.snapshot()?;
        Ok(entries
            .iter()
            .filter(|entry| field.matches(&entry.passage, &needle))
            .take(limit)
            .map(|entry| entry.passage.clone())
            .collect())
    }

    async fn semantic_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredPassage>> {
        let query_embedding = self.embedder.embed(query).await?;
        let scored = {
            let entries = self.snapshot()?;
            entries
                .iter()
                .map(|entry| {
                    (
                        entry.passage.clone(),
                        cosine_distance(&query_embedding, &entry.embedding),
                    )
                })
                .collect::<Vec<_>>()
        };
        Ok(rank_by_distance(scored, k))
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.snapshot()?.len())
    }
}
