//! Search command handler.
//!
//! Runs the retrieval cascade only and prints what the generator would see.

use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::{format_context, CascadePolicy};

/// Run the retrieval cascade and print the context
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Cascade policy (standard, concept-first); defaults to rag.cascade
    #[arg(long)]
    pub cascade: Option<String>,

    /// Override rag.topK
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let mut config = config.clone();
        if let Some(top_k) = self.top_k {
            config.rag.top_k = top_k;
        }
        if let Some(cascade) = &self.cascade {
            // Validate early so a typo is reported before the store opens
            cascade.parse::<CascadePolicy>()?;
            config.rag.cascade = cascade.clone();
        }
        config.validate()?;

        let store = sensai_retrieval::open_store(&config)?;
        let engine = sensai_retrieval::build_engine(&config, store)?;
        let retrieval = engine.retrieve(&self.query).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&retrieval)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!(
                "Strategy: {} ({} results, cascade {})",
                retrieval.strategy,
                retrieval.results.len(),
                engine.policy()
            );
            println!();
            println!("{}", format_context(&retrieval.results));
        }

        Ok(())
    }
}
