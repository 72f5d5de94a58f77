//! Document store collaborator.
//!
//! The retrieval engine only reads passages. Ingestion writes go through the
//! concrete stores and are expected to happen out of band.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{Passage, ScoredPassage};
use sensai_core::AppResult;

/// Passage metadata field a lookup can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Source,
    Subject,
    Level,
}

impl MetadataField {
    /// Value of this field on `passage`, if present.
    pub fn value_of<'a>(&self, passage: &'a Passage) -> Option<&'a str> {
        match self {
            MetadataField::Source => Some(passage.metadata.source.as_str()),
            MetadataField::Subject => passage.metadata.subject.as_deref(),
            MetadataField::Level => passage.metadata.level.as_deref(),
        }
    }

    /// Case-insensitive substring test; `needle_lower` must already be
    /// lower-cased.
    pub fn matches(&self, passage: &Passage, needle_lower: &str) -> bool {
        self.value_of(passage)
            .map(|value| value.to_lowercase().contains(needle_lower))
            .unwrap_or(false)
    }
}

/// Query interface consumed by the retrieval engine.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs (e.g., "sqlite").
    fn name(&self) -> &str;

    /// Passages whose `field` contains `needle` (case-insensitive), at most
    /// `limit`, in insertion order. No match is an empty list.
    async fn find_by_metadata_substring(
        &self,
        field: MetadataField,
        needle: &str,
        limit: usize,
    ) -> AppResult<Vec<Passage>>;

    /// The `k` nearest passages to `query`, closest first. Scores are cosine
    /// distances: lower is closer.
    async fn semantic_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredPassage>>;

    /// Number of passages in the store.
    async fn count(&self) -> AppResult<usize>;
}

/// `1 - cosine similarity`; 1.0 when either vector is zero or the lengths
/// differ.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot_product / (norm_a * norm_b)
}

/// Sort by ascending distance (stable, so ties keep insertion order) and keep
/// the first `k`. Non-finite distances rank last.
pub(crate) fn rank_by_distance(mut scored: Vec<ScoredPassage>, k: usize) -> Vec<ScoredPassage> {
    for entry in scored.iter_mut() {
        if !entry.1.is_finite() {
            entry.1 = f32::MAX;
        }
    }
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 0.001);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 0.001);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 0.001);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_metadata_field_matching() {
        let passage = Passage::new("texte", "Programmes/Maths_Tle_Spé.pdf").with_level("Tle");
        assert!(MetadataField::Source.matches(&passage, "maths_tle"));
        assert!(MetadataField::Level.matches(&passage, "tle"));
        assert!(!MetadataField::Subject.matches(&passage, "maths"));
    }

    #[test]
    fn test_rank_by_distance_stable() {
        let scored = vec![
            (Passage::new("a", "a"), 0.4),
            (Passage::new("b", "b"), 0.1),
            (Passage::new("c", "c"), 0.4),
        ];
        let ranked = rank_by_distance(scored, 2);
        assert_eq!(ranked[0].0.text, "b");
        assert_eq!(ranked[1].0.text, "a");
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_rank_by_distance_with_nan_scores() {
        let scored: Vec<ScoredPassage> = (0..40)
            .map(|i| {
                let score = if i % 3 == 0 { f32::NAN } else { i as f32 / 100.0 };
                (Passage::new(format!("p{}", i), "doc.pdf"), score)
            })
            .collect();

        let ranked = rank_by_distance(scored, 5);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].0.text, "p1");
        assert_eq!(ranked[1].0.text, "p2");
        assert!(ranked.iter().all(|(_, score)| score.is_finite()));
    }

    #[test]
    fn test_overflowing_embeddings_rank_last() {
        let distance = cosine_distance(&[1e30, 1e30], &[1e30, 0.0]);
        let scored = vec![
            (Passage::new("overflow", "a.pdf"), distance),
            (Passage::new("close", "b.pdf"), 0.2),
        ];
        let ranked = rank_by_distance(scored, 2);
        assert_eq!(ranked[0].0.text, "close");
        assert_eq!(ranked[1].0.text, "overflow");
    }
}
