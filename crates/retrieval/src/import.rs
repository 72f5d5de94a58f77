//! JSON-lines passage import into the SQLite store.
//!
//! One record per line:
//! `{"text": "...", "metadata": {"source": "...", "page": 3}, "embedding": [..]}`.
//! `embedding` is optional; records without one are embedded on insert.

use crate::store::SqliteStore;
use crate::types::Passage;
use sensai_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct PassageRecord {
    #[serde(flatten)]
    passage: Passage,

    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub files: usize,
    pub imported: usize,
    pub skipped: usize,
}

/// `.jsonl` files under `path` (or `path` itself), sorted.
pub fn collect_files(path: &Path) -> AppResult<Vec<PathBuf>> {
    if !path.exists() {
        return Err(AppError::Other(format!("Import path not found: {:?}", path)));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Import every record found at `path` into `store`.
///
/// Malformed lines and empty texts are skipped with a warning; store errors
/// abort the import.
pub async fn import_path(store: &SqliteStore, path: &Path) -> AppResult<ImportStats> {
    let mut stats = ImportStats::default();

    for file in collect_files(path)? {
        let contents = tokio::fs::read_to_string(&file).await?;
        stats.files += 1;

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record: PassageRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping {:?} line {}: {}", file, line_no + 1, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if record.passage.text.trim().is_empty() {
                tracing::warn!("Skipping {:?} line {}: empty text", file, line_no + 1);
                stats.skipped += 1;
                continue;
            }

            store.insert(&record.passage, record.embedding).await?;
            stats.imported += 1;
        }

        tracing::debug!("Imported {:?}", file);
    }

    tracing::info!(
        "Imported {} passages from {} files ({} skipped) into '{}'",
        stats.imported,
        stats.files,
        stats.skipped,
        store.collection()
    );
    Ok(stats)
}
