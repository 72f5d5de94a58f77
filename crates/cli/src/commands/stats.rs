//! Stats command handler.

use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::store::DocumentStore;

/// Show document store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let index_path = config.index_path();
        if !index_path.exists() {
            return Err(AppError::Store(format!(
                "No document store at {:?}. Run 'sensai import' first.",
                index_path
            )));
        }

        let store = sensai_retrieval::open_store(config)?;
        let passages = store.count().await?;
        let embedder = store.embedder();
        let prompts = sensai_prompt::list_prompts(&config.workspace)?;

        if self.json {
            let output = serde_json::json!({
                "index": index_path,
                "collection": store.collection(),
                "passages": passages,
                "embeddingProvider": embedder.provider_name(),
                "embeddingModel": embedder.model_name(),
                "embeddingDimensions": embedder.dimensions(),
                "prompts": prompts,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("Index:      {}", index_path.display());
            println!("Collection: {}", store.collection());
            println!("Passages:   {}", passages);
            println!(
                "Embeddings: {} / {} ({} dims)",
                embedder.provider_name(),
                embedder.model_name(),
                embedder.dimensions()
            );
            println!("Prompts:    {}", prompts.join(", "));
        }

        Ok(())
    }
}
