//! Query Analyzer: substring matching of a free-text query against the
//! taxonomy.

use crate::taxonomy::Taxonomy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tokens dropped from `keywords`.
const STOP_WORDS: [&str; 12] = [
    "le", "la", "les", "un", "une", "des", "ce", "ces", "est", "sont", "quels", "quelles",
];

/// Per-request analysis. Every list is ordered by taxonomy iteration order
/// (keywords by position in the query) and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub subjects: Vec<String>,
    pub subfields: Vec<String>,
    pub levels: Vec<String>,
    pub concepts: Vec<String>,
    pub keywords: Vec<String>,
}

impl QueryAnalysis {
    /// First detected subject, used to build structural tags.
    pub fn primary_subject(&self) -> Option<&str> {
        self.subjects.first().map(String::as_str)
    }

    /// First detected level (principal or sub-level).
    pub fn primary_level(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    /// True when nothing in the taxonomy matched.
    pub fn has_no_taxonomy_match(&self) -> bool {
        self.subjects.is_empty()
            && self.subfields.is_empty()
            && self.levels.is_empty()
            && self.concepts.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Stateless analyzer over a shared, immutable taxonomy.
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    taxonomy: Arc<Taxonomy>,
}

impl QueryAnalyzer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let query = query.to_lowercase();
        let mut analysis = QueryAnalysis::default();

        for subject in self.taxonomy.subjects() {
            if subject.aliases.iter().any(|a| query.contains(a.as_str())) {
                push_unique(&mut analysis.subjects, &subject.name);
            }

            for subfield in &subject.subfields {
                if subfield.aliases.iter().any(|a| query.contains(a.as_str())) {
                    push_unique(&mut analysis.subfields, &subfield.name);
                    push_unique(&mut analysis.subjects, &subject.name);
                }
            }
        }

        // Concepts match on their own, whether or not the owner was detected
        for subject in self.taxonomy.subjects() {
            for subfield in &subject.subfields {
                for concept in &subfield.concepts {
                    if query.contains(concept.as_str()) {
                        push_unique(&mut analysis.concepts, concept);
                    }
                }
            }
        }

        for level in self.taxonomy.levels() {
            if level.aliases.iter().any(|a| query.contains(a.as_str())) {
                push_unique(&mut analysis.levels, &level.name);
            }

            for sub_level in &level.sub_levels {
                if sub_level.aliases.iter().any(|a| query.contains(a.as_str())) {
                    push_unique(&mut analysis.levels, &sub_level.name);
                }
            }
        }

        if analysis.subjects.is_empty() && !analysis.concepts.is_empty() {
            for concept in &analysis.concepts {
                if let Some(owner) = self.taxonomy.lookup_concept(concept) {
                    push_unique(&mut analysis.subjects, &owner.subject);
                    if let Some(subfield) = &owner.subfield {
                        push_unique(&mut analysis.subfields, subfield);
                    }
                }
            }
        }

        for token in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
            if token.chars().count() > 2 && !STOP_WORDS.contains(&token) {
                push_unique(&mut analysis.keywords, token);
            }
        }

        tracing::debug!(
            subjects = ?analysis.subjects,
            subfields = ?analysis.subfields,
            levels = ?analysis.levels,
            concepts = ?analysis.concepts,
            "Query analysed"
        );

        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> QueryAnalyzer {
        QueryAnalyzer::new(Arc::new(Taxonomy::builtin().unwrap()))
    }

    #[test]
    fn test_subject_level_and_concept() {
        let analysis = analyzer().analyze("je veux comprendre les équations de maths en terminale");
        assert_eq!(analysis.subjects, vec!["maths"]);
        assert_eq!(analysis.levels, vec!["Tle"]);
        assert!(analysis.concepts.contains(&"équation".to_string()));
    }

    #[test]
    fn test_subfield_alias_adds_parent_subject() {
        let analysis = analyzer().analyze("Quels sont les théorèmes de géométrie en 3ème ?");
        assert_eq!(analysis.subjects, vec!["maths"]);
        assert_eq!(analysis.subfields, vec!["géométrie"]);
        assert_eq!(analysis.levels, vec!["3ème"]);
        assert_eq!(analysis.concepts, vec!["théorème"]);
    }

    #[test]
    fn test_backfill_subject_from_concept() {
        let analysis = analyzer().analyze("Explique la notion de dérivée");
        assert_eq!(analysis.subjects, vec!["maths"]);
        assert_eq!(analysis.subfields, vec!["analyse"]);
        assert_eq!(analysis.concepts, vec!["dérivée"]);
    }

    #[test]
    fn test_no_backfill_when_subject_detected() {
        let analysis = analyzer().analyze("la vitesse en physique");
        assert_eq!(analysis.subjects, vec!["physique-chimie"]);
        assert!(analysis.subfields.is_empty());
        assert_eq!(analysis.concepts, vec!["vitesse"]);
    }

    #[test]
    fn test_principal_and_sub_levels_share_list() {
        let analysis = analyzer().analyze("programme du collège en 4ème");
        assert_eq!(analysis.levels, vec!["collège", "4ème"]);
    }

    #[test]
    fn test_zero_matches_is_empty_not_error() {
        let analysis = analyzer().analyze("bonjour");
        assert!(analysis.has_no_taxonomy_match());
        assert_eq!(analysis.keywords, vec!["bonjour"]);
        assert_eq!(analysis.primary_subject(), None);
    }

    #[test]
    fn test_keywords_drop_short_tokens_and_stop_words() {
        let analysis = analyzer().analyze("Quels sont les chapitres de l'année ? Les chapitres !");
        assert_eq!(analysis.keywords, vec!["chapitres", "année"]);
    }

    #[test]
    fn test_case_insensitive() {
        let analysis = analyzer().analyze("PROGRAMME DE MATHS EN SECONDE");
        assert_eq!(analysis.subjects, vec!["maths"]);
        assert_eq!(analysis.levels, vec!["Seconde"]);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = analyzer();
        let query = "Explique le chapitre sur les suites et les limites en première";
        assert_eq!(analyzer.analyze(query), analyzer.analyze(query));
    }
}
