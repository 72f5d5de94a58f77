//! Taxonomy Index.
//!
//! The curriculum taxonomy (subjects → sub-fields → concepts, levels →
//! sub-levels) is loaded from YAML, validated, lower-cased, and flattened
//! into a [`ConceptIndex`] once at startup. Nothing here mutates after
//! [`Taxonomy::build`] returns, so a `Taxonomy` can be shared behind an `Arc`
//! by concurrent requests.

use sensai_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Taxonomy compiled into the binary.
pub const BUILTIN_TAXONOMY: &str = include_str!("../data/taxonomy.yaml");

/// Raw taxonomy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyDefinition {
    pub subjects: Vec<SubjectEntry>,
    #[serde(default)]
    pub levels: Vec<LevelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub subfields: Vec<SubfieldEntry>,
    /// Programme topics per level, keyed by level or sub-level name.
    #[serde(default)]
    pub level_topics: Vec<LevelTopics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTopics {
    pub level: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubfieldEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub sub_levels: Vec<SubLevelEntry>,
    /// Optional tracks such as lycée specialities.
    #[serde(default)]
    pub specialities: Vec<SubLevelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLevelEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Owner of an indexed alias or concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRef {
    pub subject: String,
    pub subfield: Option<String>,
}

/// Result of [`Taxonomy::lookup_level`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRef {
    pub level: String,
    pub sub_level: Option<String>,
}

/// Result of [`Taxonomy::find_specialities`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialityRef {
    pub level: String,
    pub speciality: String,
}

/// Flattened alias/concept → owner mapping.
///
/// Keys keep first-insertion order; re-inserting a key replaces its owner in
/// place, so iteration order is stable across builds of the same taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptIndex {
    entries: Vec<(String, ConceptRef)>,
    positions: HashMap<String, usize>,
}

impl ConceptIndex {
    /// Insert or replace; returns the previous owner.
    fn insert(&mut self, key: String, owner: ConceptRef) -> Option<ConceptRef> {
        match self.positions.get(&key) {
            Some(&idx) => Some(std::mem::replace(&mut self.entries[idx].1, owner)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, owner));
                None
            }
        }
    }

    /// Exact lookup of an already lower-cased key.
    pub fn get(&self, key: &str) -> Option<&ConceptRef> {
        self.positions.get(key).map(|&idx| &self.entries[idx].1)
    }

    /// Exact match first, then the first key (in index order) that contains
    /// the term or is contained in it.
    pub fn lookup(&self, term: &str) -> Option<&ConceptRef> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }

        if let Some(owner) = self.get(&term) {
            return Some(owner);
        }

        self.entries
            .iter()
            .find(|(key, _)| key.contains(term.as_str()) || term.contains(key.as_str()))
            .map(|(_, owner)| owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConceptRef)> {
        self.entries.iter().map(|(key, owner)| (key.as_str(), owner))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A validated taxonomy plus its concept index.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    definition: TaxonomyDefinition,
    concept_index: ConceptIndex,
}

impl Taxonomy {
    /// The taxonomy shipped with the binary.
    pub fn builtin() -> AppResult<Self> {
        Self::from_yaml_str(BUILTIN_TAXONOMY)
    }

    /// Load from `path`, or the built-in taxonomy when no path is configured.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Taxonomy(format!("Failed to read taxonomy file {:?}: {}", path, e))
        })?;
        tracing::info!("Loading taxonomy from {:?}", path);
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> AppResult<Self> {
        let definition: TaxonomyDefinition = serde_yaml::from_str(contents)
            .map_err(|e| AppError::Taxonomy(format!("Failed to parse taxonomy: {}", e)))?;
        Self::build(definition)
    }

    /// Validate, normalize and index a taxonomy definition.
    pub fn build(definition: TaxonomyDefinition) -> AppResult<Self> {
        let definition = normalize(definition)?;
        validate(&definition)?;
        let concept_index = build_concept_index(&definition);

        tracing::debug!(
            subjects = definition.subjects.len(),
            levels = definition.levels.len(),
            indexed_terms = concept_index.len(),
            "Taxonomy index built"
        );

        Ok(Self {
            definition,
            concept_index,
        })
    }

    pub fn subjects(&self) -> &[SubjectEntry] {
        &self.definition.subjects
    }

    pub fn levels(&self) -> &[LevelEntry] {
        &self.definition.levels
    }

    pub fn concept_index(&self) -> &ConceptIndex {
        &self.concept_index
    }

    /// Resolve a concept or alias to its subject and sub-field.
    pub fn lookup_concept(&self, term: &str) -> Option<&ConceptRef> {
        self.concept_index.lookup(term)
    }

    /// Resolve a level alias exactly. Levels are scanned in taxonomy order,
    /// each principal level before its own sub-levels.
    pub fn lookup_level(&self, term: &str) -> Option<LevelRef> {
        let term = term.trim().to_lowercase();

        for level in &self.definition.levels {
            if level.aliases.iter().any(|a| *a == term) {
                return Some(LevelRef {
                    level: level.name.clone(),
                    sub_level: None,
                });
            }

            if let Some(sub) = level
                .sub_levels
                .iter()
                .find(|sub| sub.aliases.iter().any(|a| *a == term))
            {
                return Some(LevelRef {
                    level: level.name.clone(),
                    sub_level: Some(sub.name.clone()),
                });
            }
        }

        None
    }

    /// Programme topics of `subject` at `level`; empty when none are listed.
    pub fn topics_for(&self, subject: &str, level: &str) -> &[String] {
        self.definition
            .subjects
            .iter()
            .find(|s| s.name == subject)
            .and_then(|s| s.level_topics.iter().find(|t| t.level == level))
            .map(|t| t.topics.as_slice())
            .unwrap_or(&[])
    }

    /// Specialities whose aliases occur in `query`, in taxonomy order.
    pub fn find_specialities(&self, query: &str) -> Vec<SpecialityRef> {
        let query = query.to_lowercase();
        self.definition
            .levels
            .iter()
            .flat_map(|level| {
                level
                    .specialities
                    .iter()
                    .map(move |speciality| (level, speciality))
            })
            .filter(|(_, speciality)| {
                speciality
                    .aliases
                    .iter()
                    .any(|alias| query.contains(alias.as_str()))
            })
            .map(|(level, speciality)| SpecialityRef {
                level: level.name.clone(),
                speciality: speciality.name.clone(),
            })
            .collect()
    }
}

fn normalize_terms(terms: Vec<String>, owner: &str, kind: &str) -> AppResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(AppError::Taxonomy(format!(
                "Empty {} in taxonomy entry '{}'",
                kind, owner
            )));
        }
        if seen.insert(term.clone()) {
            normalized.push(term);
        }
    }
    Ok(normalized)
}

fn normalize(definition: TaxonomyDefinition) -> AppResult<TaxonomyDefinition> {
    let mut subjects = Vec::with_capacity(definition.subjects.len());
    for subject in definition.subjects {
        let name = subject.name.trim().to_string();
        let mut subfields = Vec::with_capacity(subject.subfields.len());
        for subfield in subject.subfields {
            let subfield_name = subfield.name.trim().to_string();
            subfields.push(SubfieldEntry {
                aliases: normalize_terms(subfield.aliases, &subfield_name, "alias")?,
                concepts: normalize_terms(subfield.concepts, &subfield_name, "concept")?,
                name: subfield_name,
            });
        }
        let mut level_topics = Vec::with_capacity(subject.level_topics.len());
        for entry in subject.level_topics {
            level_topics.push(LevelTopics {
                level: entry.level.trim().to_string(),
                topics: normalize_terms(entry.topics, &name, "topic")?,
            });
        }
        subjects.push(SubjectEntry {
            aliases: normalize_terms(subject.aliases, &name, "alias")?,
            name,
            subfields,
            level_topics,
        });
    }

    let mut levels = Vec::with_capacity(definition.levels.len());
    for level in definition.levels {
        let name = level.name.trim().to_string();
        let mut sub_levels = Vec::with_capacity(level.sub_levels.len());
        for sub in level.sub_levels {
            let sub_name = sub.name.trim().to_string();
            sub_levels.push(SubLevelEntry {
                aliases: normalize_terms(sub.aliases, &sub_name, "alias")?,
                name: sub_name,
            });
        }
        let mut specialities = Vec::with_capacity(level.specialities.len());
        for speciality in level.specialities {
            let speciality_name = speciality.name.trim().to_string();
            specialities.push(SubLevelEntry {
                aliases: normalize_terms(speciality.aliases, &speciality_name, "alias")?,
                name: speciality_name,
            });
        }
        levels.push(LevelEntry {
            aliases: normalize_terms(level.aliases, &name, "alias")?,
            name,
            sub_levels,
            specialities,
        });
    }

    Ok(TaxonomyDefinition { subjects, levels })
}

fn validate(definition: &TaxonomyDefinition) -> AppResult<()> {
    if definition.subjects.is_empty() {
        return Err(AppError::Taxonomy("Taxonomy has no subjects".to_string()));
    }

    // Principal and sub-level names share the analyzer's `levels` list
    let mut level_names = HashSet::new();
    for level in &definition.levels {
        let names = std::iter::once(&level.name).chain(level.sub_levels.iter().map(|s| &s.name));
        for name in names {
            if name.is_empty() {
                return Err(AppError::Taxonomy("Level name cannot be empty".to_string()));
            }
            if !level_names.insert(name.as_str()) {
                return Err(AppError::Taxonomy(format!("Duplicate level: {}", name)));
            }
        }

        if level.specialities.iter().any(|s| s.name.is_empty()) {
            return Err(AppError::Taxonomy(format!(
                "Speciality name cannot be empty (level '{}')",
                level.name
            )));
        }
    }

    let mut subject_names = HashSet::new();
    for subject in &definition.subjects {
        if subject.name.is_empty() {
            return Err(AppError::Taxonomy("Subject name cannot be empty".to_string()));
        }
        if !subject_names.insert(subject.name.as_str()) {
            return Err(AppError::Taxonomy(format!(
                "Duplicate subject: {}",
                subject.name
            )));
        }

        let mut subfield_names = HashSet::new();
        for subfield in &subject.subfields {
            if subfield.name.is_empty() {
                return Err(AppError::Taxonomy(format!(
                    "Sub-field name cannot be empty (subject '{}')",
                    subject.name
                )));
            }
            if !subfield_names.insert(subfield.name.as_str()) {
                return Err(AppError::Taxonomy(format!(
                    "Duplicate sub-field '{}' in subject '{}'",
                    subfield.name, subject.name
                )));
            }
        }

        for entry in &subject.level_topics {
            if !level_names.contains(entry.level.as_str()) {
                return Err(AppError::Taxonomy(format!(
                    "Unknown level '{}' in topics of subject '{}'",
                    entry.level, subject.name
                )));
            }
        }
    }

    Ok(())
}

fn claim(index: &mut ConceptIndex, key: &str, owner: ConceptRef) {
    let subject = owner.subject.clone();
    if let Some(previous) = index.insert(key.to_string(), owner) {
        if previous.subject != subject {
            tracing::warn!(
                term = key,
                previous = %previous.subject,
                current = %subject,
                "Taxonomy term claimed by two subjects, keeping the last one"
            );
        }
    }
}

fn build_concept_index(definition: &TaxonomyDefinition) -> ConceptIndex {
    let mut index = ConceptIndex::default();

    for subject in &definition.subjects {
        for alias in &subject.aliases {
            claim(
                &mut index,
                alias,
                ConceptRef {
                    subject: subject.name.clone(),
                    subfield: None,
                },
            );
        }

        for subfield in &subject.subfields {
            for term in subfield.aliases.iter().chain(subfield.concepts.iter()) {
                claim(
                    &mut index,
                    term,
                    ConceptRef {
                        subject: subject.name.clone(),
                        subfield: Some(subfield.name.clone()),
                    },
                );
            }
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
subjects:
  - name: maths
    aliases: [Maths, MATH]
    subfields:
      - name: géométrie
        aliases: [géométrie]
        concepts: [Théorème, triangle]
  - name: physique
    aliases: [physique]
    subfields:
      - name: mécanique
        aliases: [mécanique]
        concepts: [vitesse]
levels:
  - name: collège
    aliases: [collège]
    sub_levels:
      - name: 3ème
        aliases: [3ème, troisième]
"#;

    #[test]
    fn test_builtin_taxonomy_builds() {
        let taxonomy = Taxonomy::builtin().unwrap();
        assert_eq!(taxonomy.subjects()[0].name, "maths");
        assert_eq!(taxonomy.levels().len(), 3);
        assert!(!taxonomy.concept_index().is_empty());
    }

    #[test]
    fn test_aliases_and_concepts_lowercased() {
        let taxonomy = Taxonomy::from_yaml_str(SMALL).unwrap();
        assert_eq!(taxonomy.subjects()[0].aliases, vec!["maths", "math"]);
        assert_eq!(
            taxonomy.subjects()[0].subfields[0].concepts,
            vec!["théorème", "triangle"]
        );
    }

    #[test]
    fn test_lookup_concept_exact() {
        let taxonomy = Taxonomy::from_yaml_str(SMALL).unwrap();
        let owner = taxonomy.lookup_concept("Théorème").unwrap();
        assert_eq!(owner.subject, "maths");
        assert_eq!(owner.subfield.as_deref(), Some("géométrie"));

        let owner = taxonomy.lookup_concept("maths").unwrap();
        assert_eq!(owner.subfield, None);
    }

    #[test]
    fn test_lookup_concept_substring_both_directions() {
        let taxonomy = Taxonomy::from_yaml_str(SMALL).unwrap();
        // term contains key
        assert_eq!(
            taxonomy.lookup_concept("triangles rectangles").unwrap().subject,
            "maths"
        );
        // key contains term
        assert_eq!(
            taxonomy.lookup_concept("vitess").unwrap().subfield.as_deref(),
            Some("mécanique")
        );
        assert!(taxonomy.lookup_concept("bonjour").is_none());
        assert!(taxonomy.lookup_concept("  ").is_none());
    }

    #[test]
    fn test_lookup_level() {
        let taxonomy = Taxonomy::from_yaml_str(SMALL).unwrap();
        assert_eq!(
            taxonomy.lookup_level("Collège"),
            Some(LevelRef {
                level: "collège".to_string(),
                sub_level: None
            })
        );
        assert_eq!(
            taxonomy.lookup_level("troisième"),
            Some(LevelRef {
                level: "collège".to_string(),
                sub_level: Some("3ème".to_string())
            })
        );
        assert_eq!(taxonomy.lookup_level("terminale"), None);
    }

    #[test]
    fn test_builtin_lookup_level_terminale() {
        let taxonomy = Taxonomy::builtin().unwrap();
        let level = taxonomy.lookup_level("terminale").unwrap();
        assert_eq!(level.level, "lycée");
        assert_eq!(level.sub_level.as_deref(), Some("Tle"));
    }

    #[test]
    fn test_index_is_deterministic() {
        let first = Taxonomy::builtin().unwrap();
        let second = Taxonomy::builtin().unwrap();
        assert_eq!(first.concept_index(), second.concept_index());

        for (term, owner) in first.concept_index().iter() {
            assert_eq!(second.lookup_concept(term), Some(owner));
        }
    }

    #[test]
    fn test_alias_claimed_by_two_subjects_last_wins() {
        let yaml = r#"
subjects:
  - name: maths
    aliases: [calcul]
  - name: physique
    aliases: [calcul]
"#;
        let taxonomy = Taxonomy::from_yaml_str(yaml).unwrap();
        assert_eq!(taxonomy.lookup_concept("calcul").unwrap().subject, "physique");
        assert_eq!(taxonomy.concept_index().len(), 1);
    }

    #[test]
    fn test_duplicate_subject_rejected() {
        let yaml = "subjects:\n  - name: maths\n  - name: maths\n";
        assert!(matches!(
            Taxonomy::from_yaml_str(yaml),
            Err(AppError::Taxonomy(_))
        ));
    }

    #[test]
    fn test_duplicate_subfield_rejected() {
        let yaml = r#"
subjects:
  - name: maths
    subfields:
      - name: analyse
      - name: analyse
"#;
        assert!(Taxonomy::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let yaml = r#"
subjects:
  - name: maths
levels:
  - name: lycée
    sub_levels:
      - name: lycée
"#;
        assert!(Taxonomy::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_empty_alias_rejected() {
        let yaml = "subjects:\n  - name: maths\n    aliases: [\"  \"]\n";
        assert!(matches!(
            Taxonomy::from_yaml_str(yaml),
            Err(AppError::Taxonomy(msg)) if msg.contains("alias")
        ));
    }

    #[test]
    fn test_malformed_yaml_is_taxonomy_error() {
        assert!(matches!(
            Taxonomy::from_yaml_str("subjects: {"),
            Err(AppError::Taxonomy(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("taxonomy.yaml");
        std::fs::write(&path, SMALL).unwrap();

        let taxonomy = Taxonomy::load(Some(&path)).unwrap();
        assert_eq!(taxonomy.subjects().len(), 2);
        assert!(Taxonomy::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_builtin_level_topics_and_specialities() {
        let taxonomy = Taxonomy::builtin().unwrap();
        assert!(taxonomy
            .topics_for("maths", "3ème")
            .contains(&"géométrie dans l'espace".to_string()));
        assert!(taxonomy.topics_for("maths", "CP").is_empty());
        assert!(taxonomy.topics_for("philosophie", "Tle").is_empty());

        assert_eq!(
            taxonomy.find_specialities("Je suis en Spé-Maths cette année"),
            vec![SpecialityRef {
                level: "lycée".to_string(),
                speciality: "Mathématiques".to_string()
            }]
        );
        assert!(taxonomy.find_specialities("bonjour").is_empty());
    }

    #[test]
    fn test_topics_for_unknown_level_rejected() {
        let yaml = r#"
subjects:
  - name: maths
    level_topics:
      - level: 7ème
        topics: [fractions]
levels:
  - name: collège
    sub_levels:
      - name: 6ème
"#;
        assert!(matches!(
            Taxonomy::from_yaml_str(yaml),
            Err(AppError::Taxonomy(msg)) if msg.contains("7ème")
        ));
    }
}
