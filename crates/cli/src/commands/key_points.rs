//! Key-points command handler.

use clap::Args;
use sensai_core::{config::AppConfig, AppResult};
use sensai_retrieval::KeyPointExtractor;
use std::path::{Path, PathBuf};

/// Extract the key points of a curriculum file into a markdown file
#[derive(Args, Debug)]
pub struct KeyPointsCommand {
    /// Text file to summarise
    pub file: PathBuf,

    /// Output directory (default: .sensai/key_points)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

impl KeyPointsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing key-points command");

        let extractor = sensai_retrieval::build_key_point_extractor(config)?;
        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| config.sensai_dir().join("key_points"));

        let written = self.write(&extractor, &output_dir).await?;
        println!("Key points written to {}", written.display());

        Ok(())
    }

    async fn write(&self, extractor: &dyn KeyPointExtractor, output_dir: &Path) -> AppResult<PathBuf> {
        sensai_retrieval::extract_key_points_to_file(extractor, &self.file, output_dir).await
    }
}
