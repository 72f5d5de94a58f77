//! Context Formatter: renders retrieved passages into the block handed to the
//! response generator.

use crate::types::{Passage, ScoredPassage};
use std::path::Path;

/// Returned instead of a context block when nothing was retrieved.
pub const NO_RELEVANT_DOCUMENT: &str = "Aucun document pertinent trouvé.";

/// Placeholder for a subject or level that could not be inferred.
pub const UNKNOWN_TOKEN: &str = "inconnue";

/// `1 - score` for distance-like scores, floored to 0 above 1.0.
///
/// Lossy: structural scores (0.8 to 1.0) come out as 0.0 to 0.2 even though
/// they are the strongest matches.
pub fn normalized_relevance(score: f32) -> f32 {
    if score <= 1.0 {
        1.0 - score
    } else {
        0.0
    }
}

/// File name of the passage source with its extension stripped.
pub fn display_name(passage: &Passage) -> String {
    Path::new(&passage.metadata.source)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "doc".to_string())
}

/// Subject and level read from the first two `_` segments of the file name.
fn subject_and_level(name: &str) -> (String, String) {
    let mut segments = name.split('_');
    let mut next = || {
        segments
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_TOKEN.to_string())
    };
    let subject = next();
    let level = next();
    (subject, level)
}

pub fn format_context(results: &[ScoredPassage]) -> String {
    if results.is_empty() {
        return NO_RELEVANT_DOCUMENT.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, (passage, score))| {
            let name = display_name(passage);
            let (subject, level) = subject_and_level(&name);
            format!(
                "---Document {}: {} (pertinence : {:.2}, matière : {}, niveau : {})---\n{}\n",
                i + 1,
                name,
                normalized_relevance(*score),
                subject,
                level,
                passage.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
