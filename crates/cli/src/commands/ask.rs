//! Ask command handler.
//!
//! One-shot answer through the full orchestrator, as `/generate` would
//! produce it, without conversation history.

use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::ChatMessage;
use std::sync::Arc;

/// Answer one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The student's question
    pub question: String,

    /// Print answer, strategy, analysis and sources as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        if self.question.trim().is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }

        let store = sensai_retrieval::open_store(config)?;
        let engine = Arc::new(sensai_retrieval::build_engine(config, store)?);
        let orchestrator = sensai_retrieval::build_orchestrator(config, engine)?;

        let history = [ChatMessage::user(self.question.clone())];
        let response = orchestrator
            .respond_with_provenance(&self.question, &history)
            .await?;

        if self.json {
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", response.answer);
            tracing::debug!(
                "Answered via {} from {} passages",
                response.strategy,
                response.sources.len()
            );
        }

        Ok(())
    }
}
