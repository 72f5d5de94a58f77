//! Analyze command handler.

use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::{engine::subject_level_tag, QueryAnalyzer, Taxonomy};
use serde::Serialize;
use std::sync::Arc;

/// Show how a query maps onto the taxonomy
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// Query text
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOutput {
    #[serde(flatten)]
    analysis: sensai_retrieval::QueryAnalysis,
    tag: Option<String>,
    level_hierarchy: Vec<sensai_retrieval::LevelRef>,
    concept_owners: Vec<ConceptOwner>,
    level_topics: Vec<LevelTopicsOutput>,
    specialities: Vec<sensai_retrieval::SpecialityRef>,
}

#[derive(Debug, Serialize)]
struct LevelTopicsOutput {
    subject: String,
    level: String,
    topics: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ConceptOwner {
    concept: String,
    subject: String,
    subfield: Option<String>,
}

/// Analysis plus the resolved level and concept owners.
fn describe(taxonomy: &Arc<Taxonomy>, query: &str) -> AnalyzeOutput {
    let analysis = QueryAnalyzer::new(taxonomy.clone()).analyze(query);

    let level_hierarchy = analysis
        .levels
        .iter()
        .filter_map(|level| taxonomy.lookup_level(level))
        .collect();

    let concept_owners = analysis
        .concepts
        .iter()
        .filter_map(|concept| {
            taxonomy.lookup_concept(concept).map(|owner| ConceptOwner {
                concept: concept.clone(),
                subject: owner.subject.clone(),
                subfield: owner.subfield.clone(),
            })
        })
        .collect();

    let level_topics = analysis
        .subjects
        .iter()
        .flat_map(|subject| analysis.levels.iter().map(move |level| (subject, level)))
        .filter_map(|(subject, level)| {
            let topics = taxonomy.topics_for(subject, level);
            (!topics.is_empty()).then(|| LevelTopicsOutput {
                subject: subject.clone(),
                level: level.clone(),
                topics: topics.to_vec(),
            })
        })
        .collect();

    AnalyzeOutput {
        tag: subject_level_tag(&analysis),
        specialities: taxonomy.find_specialities(query),
        analysis,
        level_hierarchy,
        concept_owners,
        level_topics,
    }
}

impl AnalyzeCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing analyze command");

        let taxonomy = sensai_retrieval::load_taxonomy(config)?;
        let output = describe(&taxonomy, &self.query);

        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        println!("{}", json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_resolves_levels_and_concepts() {
        let taxonomy = Arc::new(Taxonomy::builtin().unwrap());
        let output = describe(&taxonomy, "Quels sont les théorèmes de géométrie en 3ème ?");

        assert_eq!(output.tag.as_deref(), Some("maths_3ème"));
        assert_eq!(output.level_hierarchy[0].level, "collège");
        assert_eq!(output.level_hierarchy[0].sub_level.as_deref(), Some("3ème"));
        assert_eq!(output.concept_owners[0].concept, "théorème");
        assert_eq!(output.concept_owners[0].subfield.as_deref(), Some("géométrie"));

        assert_eq!(output.level_topics.len(), 1);
        assert_eq!(output.level_topics[0].level, "3ème");
        assert!(output.level_topics[0]
            .topics
            .contains(&"statistiques et probabilités".to_string()));

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["subjects"][0], "maths");
        assert!(json.get("levelHierarchy").is_some());
    }

    #[test]
    fn test_describe_reports_specialities() {
        let taxonomy = Arc::new(Taxonomy::builtin().unwrap());
        let output = describe(&taxonomy, "exercices de spé-maths en terminale");

        assert_eq!(output.specialities.len(), 1);
        assert_eq!(output.specialities[0].speciality, "Mathématiques");
        assert_eq!(output.level_topics[0].level, "Tle");
        assert!(output.level_topics[0].topics.contains(&"algorithmes".to_string()));
    }

    #[test]
    fn test_describe_no_match() {
        let taxonomy = Arc::new(Taxonomy::builtin().unwrap());
        let output = describe(&taxonomy, "bonjour");
        assert!(output.tag.is_none());
        assert!(output.level_hierarchy.is_empty());
        assert!(output.level_topics.is_empty());
        assert!(output.specialities.is_empty());
        assert!(output.analysis.has_no_taxonomy_match());
    }
}
