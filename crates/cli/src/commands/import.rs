//! Import command handler.

use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::store::DocumentStore;
use std::path::PathBuf;

/// Load JSON-lines passages into the document store
#[derive(Args, Debug)]
pub struct ImportCommand {
    /// A .jsonl file or a directory searched recursively for .jsonl files
    pub path: PathBuf,

    /// Delete the collection's passages before importing
    #[arg(long)]
    pub reset: bool,

    /// Output stats as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing import command");

        config.ensure_sensai_dir()?;
        let store = sensai_retrieval::open_store(config)?;

        if self.reset {
            store.reset()?;
        }

        let stats = sensai_retrieval::import_path(&store, &self.path).await?;
        let total = store.count().await?;

        if self.json {
            let output = serde_json::json!({
                "collection": config.rag.collection,
                "files": stats.files,
                "imported": stats.imported,
                "skipped": stats.skipped,
                "total": total,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!(
                "Imported {} passages from {} files into '{}' ({} skipped, {} total)",
                stats.imported, stats.files, config.rag.collection, stats.skipped, total
            );
        }

        Ok(())
    }
}
