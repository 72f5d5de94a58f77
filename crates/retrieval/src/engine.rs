//! Retrieval Engine: an ordered cascade of lookup strategies.
//!
//! The engine returns the result of the first strategy that finds anything
//! and never merges results across strategies. Structural strategies score
//! their hits with a constant; semantic strategies pass through the store's
//! cosine distance (lower is closer). The two scales are not comparable, so
//! [`Retrieval::strategy`] is the confidence signal callers should use.

use crate::analyzer::{QueryAnalysis, QueryAnalyzer};
use crate::store::{DocumentStore, MetadataField};
use crate::types::{Passage, ScoredPassage};
use sensai_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Lookup strategy that produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `subject_level` tag found in the passage source
    SubjectLevel,
    /// Subject name found in the passage source
    Subject,
    /// Level name found in the passage source
    Level,
    /// Semantic search on the concepts prepended to the query
    ConceptEnriched,
    /// Semantic search on the raw query
    Semantic,
}

impl Strategy {
    /// Constant score given to structural hits; `None` for semantic
    /// strategies, which keep the store's distance.
    pub fn fixed_score(&self) -> Option<f32> {
        match self {
            Strategy::SubjectLevel => Some(1.0),
            Strategy::Subject => Some(0.9),
            Strategy::Level => Some(0.8),
            Strategy::ConceptEnriched | Strategy::Semantic => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.fixed_score().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SubjectLevel => "subject_level",
            Strategy::Subject => "subject",
            Strategy::Level => "level",
            Strategy::ConceptEnriched => "concept_enriched",
            Strategy::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order in which the cascade tries its strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CascadePolicy {
    /// subject_level, subject, level, concept-enriched, semantic
    Standard,
    /// subject_level, subject, concept-enriched, then the standard cascade
    #[default]
    ConceptFirst,
}

impl CascadePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadePolicy::Standard => "standard",
            CascadePolicy::ConceptFirst => "concept-first",
        }
    }
}

impl FromStr for CascadePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(CascadePolicy::Standard),
            "concept-first" | "concept_first" => Ok(CascadePolicy::ConceptFirst),
            other => Err(AppError::Config(format!(
                "Unknown cascade policy: '{}'. Supported: standard, concept-first",
                other
            ))),
        }
    }
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one cascade run.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub analysis: QueryAnalysis,

    /// Strategy that produced `results`. When every strategy came back
    /// empty this is the last one tried.
    pub strategy: Strategy,

    pub results: Vec<ScoredPassage>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn top_passage(&self) -> Option<&Passage> {
        self.results.first().map(|(passage, _)| passage)
    }
}

pub struct RetrievalEngine {
    store: Arc<dyn DocumentStore>,
    analyzer: QueryAnalyzer,
    top_k: usize,
    policy: CascadePolicy,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn DocumentStore>, analyzer: QueryAnalyzer, top_k: usize) -> Self {
        Self {
            store,
            analyzer,
            top_k,
            policy: CascadePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CascadePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Ordered `(passage, score)` list for `query`.
    pub async fn search(&self, query: &str) -> AppResult<Vec<ScoredPassage>> {
        Ok(self.retrieve(query).await?.results)
    }

    /// Run the cascade and report which strategy answered.
    pub async fn retrieve(&self, query: &str) -> AppResult<Retrieval> {
        let analysis = self.analyzer.analyze(query);
        debug!(
            subjects = ?analysis.subjects,
            subfields = ?analysis.subfields,
            levels = ?analysis.levels,
            concepts = ?analysis.concepts,
            "Query analysed"
        );

        let (strategy, results) = match self.policy {
            CascadePolicy::Standard => self.standard_cascade(query, &analysis).await?,
            CascadePolicy::ConceptFirst => self.concept_first_cascade(query, &analysis).await?,
        };

        info!(
            policy = %self.policy,
            strategy = %strategy,
            hits = results.len(),
            "Retrieval finished"
        );

        Ok(Retrieval {
            analysis,
            strategy,
            results,
        })
    }

    async fn standard_cascade(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
    ) -> AppResult<(Strategy, Vec<ScoredPassage>)> {
        if let Some(tag) = subject_level_tag(analysis) {
            let hits = self.by_subject_level(&tag).await?;
            if !hits.is_empty() {
                return Ok((Strategy::SubjectLevel, hits));
            }
        }

        if let Some(subject) = analysis.primary_subject() {
            let hits = self.by_subject(subject).await?;
            if !hits.is_empty() {
                return Ok((Strategy::Subject, hits));
            }
        }

        if let Some(level) = analysis.primary_level() {
            let hits = self.by_level(level).await?;
            if !hits.is_empty() {
                return Ok((Strategy::Level, hits));
            }
        }

        if !analysis.concepts.is_empty() {
            let hits = self.concept_enriched(query, &analysis.concepts).await?;
            if !hits.is_empty() {
                return Ok((Strategy::ConceptEnriched, hits));
            }
        }

        Ok((Strategy::Semantic, self.semantic(query).await?))
    }

    async fn concept_first_cascade(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
    ) -> AppResult<(Strategy, Vec<ScoredPassage>)> {
        if let Some(tag) = subject_level_tag(analysis) {
            let hits = self.by_subject_level(&tag).await?;
            if !hits.is_empty() {
                return Ok((Strategy::SubjectLevel, hits));
            }
        }

        if let Some(subject) = analysis.primary_subject() {
            let hits = self.by_subject(subject).await?;
            if !hits.is_empty() {
                return Ok((Strategy::Subject, hits));
            }
        }

        if !analysis.concepts.is_empty() {
            let hits = self.concept_enriched(query, &analysis.concepts).await?;
            if !hits.is_empty() {
                return Ok((Strategy::ConceptEnriched, hits));
            }
        }

        // Full standard cascade as the fallback, structural steps included
        debug!("Concept-first steps empty, falling back to the standard cascade");
        self.standard_cascade(query, analysis).await
    }

    /// Strategy 1: `subject_level` tag in the passage source.
    pub async fn by_subject_level(&self, tag: &str) -> AppResult<Vec<ScoredPassage>> {
        self.structural(Strategy::SubjectLevel, tag).await
    }

    /// Strategy 2: subject name in the passage source.
    pub async fn by_subject(&self, subject: &str) -> AppResult<Vec<ScoredPassage>> {
        self.structural(Strategy::Subject, subject).await
    }

    /// Strategy 3: level name in the passage source.
    pub async fn by_level(&self, level: &str) -> AppResult<Vec<ScoredPassage>> {
        self.structural(Strategy::Level, level).await
    }

    /// Strategy 4: semantic search on `concepts.join(" ") + " " + query`.
    pub async fn concept_enriched(
        &self,
        query: &str,
        concepts: &[String],
    ) -> AppResult<Vec<ScoredPassage>> {
        let enriched = format!("{} {}", concepts.join(" "), query);
        debug!("Concept-enriched query: {}", enriched);
        self.store.semantic_search(&enriched, self.top_k).await
    }

    /// Strategy 5: semantic search on the raw query.
    pub async fn semantic(&self, query: &str) -> AppResult<Vec<ScoredPassage>> {
        self.store.semantic_search(query, self.top_k).await
    }

    async fn structural(&self, strategy: Strategy, needle: &str) -> AppResult<Vec<ScoredPassage>> {
        let score = strategy.fixed_score().unwrap_or(0.0);
        let passages = self
            .store
            .find_by_metadata_substring(MetadataField::Source, needle, self.top_k)
            .await?;

        debug!(
            strategy = %strategy,
            needle,
            hits = passages.len(),
            "Metadata lookup"
        );

        Ok(passages.into_iter().map(|p| (p, score)).collect())
    }
}

/// `subject_level` tag from the first detected subject and level.
pub fn subject_level_tag(analysis: &QueryAnalysis) -> Option<String> {
    match (analysis.primary_subject(), analysis.primary_level()) {
        (Some(subject), Some(level)) => Some(format!("{}_{}", subject, level)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_scores() {
        assert_eq!(Strategy::SubjectLevel.fixed_score(), Some(1.0));
        assert_eq!(Strategy::Subject.fixed_score(), Some(0.9));
        assert_eq!(Strategy::Level.fixed_score(), Some(0.8));
        assert_eq!(Strategy::ConceptEnriched.fixed_score(), None);
        assert!(!Strategy::Semantic.is_structural());
    }

    #[test]
    fn test_strategy_serializes_snake_case() {
        let json = serde_json::to_string(&Strategy::ConceptEnriched).unwrap();
        assert_eq!(json, "\"concept_enriched\"");
        assert_eq!(Strategy::SubjectLevel.to_string(), "subject_level");
    }

    #[test]
    fn test_cascade_policy_parsing() {
        assert_eq!("standard".parse::<CascadePolicy>().unwrap(), CascadePolicy::Standard);
        assert_eq!(
            "Concept-First".parse::<CascadePolicy>().unwrap(),
            CascadePolicy::ConceptFirst
        );
        assert!(matches!(
            "keyword".parse::<CascadePolicy>(),
            Err(AppError::Config(_))
        ));
        assert_eq!(CascadePolicy::default(), CascadePolicy::ConceptFirst);
    }

    #[test]
    fn test_subject_level_tag_uses_first_of_each() {
        let analysis = QueryAnalysis {
            subjects: vec!["maths".to_string(), "physique-chimie".to_string()],
            levels: vec!["collège".to_string(), "4ème".to_string()],
            ..Default::default()
        };
        assert_eq!(subject_level_tag(&analysis).as_deref(), Some("maths_collège"));

        let no_level = QueryAnalysis {
            subjects: vec!["maths".to_string()],
            ..Default::default()
        };
        assert!(subject_level_tag(&no_level).is_none());
    }
}
