//! Configuration management for SENSAI.
//!
//! Configuration is layered, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.sensai/config.yaml` in the workspace, or `SENSAI_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: the document store, prompt
//! overrides and config file all live under `.sensai/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the generator factory knows about.
pub const KNOWN_PROVIDERS: [&str; 1] = ["ollama"];

/// Embedding providers the document store can use for query embeddings.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "trigram"];

/// Cascade policies the retrieval engine can run.
pub const KNOWN_CASCADES: [&str; 2] = ["standard", "concept-first"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .sensai/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// API key for the LLM provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Response generator settings
    pub llm: LlmSettings,

    /// Retrieval and document store settings
    pub rag: RagSettings,

    /// Key-point enrichment thresholds
    pub enrichment: EnrichmentSettings,

    /// HTTP boundary settings
    pub server: ServerSettings,
}

/// Response generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2:latest".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagSettings {
    /// Collection (namespace) queried in the document store
    pub collection: String,

    /// K for semantic search, and result limit for metadata lookups
    pub top_k: usize,

    /// Provider used to embed queries ("ollama" or "trigram")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Expected embedding dimensions
    pub embedding_dimensions: usize,

    /// SQLite document store, relative to the workspace unless absolute
    pub index_path: PathBuf,

    /// Optional taxonomy YAML replacing the built-in one
    pub taxonomy_file: Option<PathBuf>,

    /// Cascade policy ("standard" or "concept-first")
    pub cascade: String,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            collection: "cours-multilingue".to_string(),
            top_k: 5,
            embedding_provider: "ollama".to_string(),
            embedding_model: "qllama/multilingual-e5-small".to_string(),
            embedding_dimensions: 384,
            index_path: PathBuf::from(".sensai/index.db"),
            taxonomy_file: None,
            cascade: "concept-first".to_string(),
        }
    }
}

/// Thresholds deciding when the top passage gets a key-point summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichmentSettings {
    pub enabled: bool,

    /// The query must have strictly more whitespace-separated tokens than this
    pub min_query_tokens: usize,

    /// The top passage must be at least this many characters long
    pub min_passage_chars: usize,

    /// At least one of these must appear in the lower-cased query
    pub trigger_words: Vec<String>,

    /// Passages are truncated to this many characters before summarisation
    pub max_document_chars: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_query_tokens: 3,
            min_passage_chars: 100,
            trigger_words: ["explique", "programme", "thème", "concept", "notion", "chapitre"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            max_document_chars: 6000,
        }
    }
}

/// HTTP boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9100,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            request_timeout_secs: 180,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    rag: Option<RagSettings>,
    enrichment: Option<EnrichmentSettings>,
    server: Option<ServerSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            rag: RagSettings::default(),
            enrichment: EnrichmentSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `SENSAI_WORKSPACE`: Override workspace path
    /// - `SENSAI_CONFIG`: Path to config file
    /// - `SENSAI_PROVIDER`: LLM provider
    /// - `SENSAI_MODEL`: Generation model
    /// - `SENSAI_API_KEY`: API key
    /// - `SENSAI_TOP_K`: Semantic search K
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(
            std::env::var("SENSAI_WORKSPACE").ok().map(PathBuf::from),
            std::env::var("SENSAI_CONFIG").ok().map(PathBuf::from),
        )
    }

    /// Like [`AppConfig::load`], with the workspace and config file given
    /// explicitly (e.g., from command-line flags).
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.sensai_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SENSAI_PROVIDER") {
            config.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("SENSAI_MODEL") {
            config.llm.model = model;
        }

        if let Ok(top_k) = std::env::var("SENSAI_TOP_K") {
            config.rag.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("SENSAI_TOP_K is not a number: {}", top_k))
            })?;
        }

        config.api_key = std::env::var("SENSAI_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, config_file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }
        if let Some(enrichment) = config_file.enrichment {
            result.enrichment = enrichment;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .sensai directory.
    pub fn sensai_dir(&self) -> PathBuf {
        self.workspace.join(".sensai")
    }

    /// Ensure the .sensai directory exists.
    pub fn ensure_sensai_dir(&self) -> AppResult<()> {
        let sensai_dir = self.sensai_dir();
        if !sensai_dir.exists() {
            std::fs::create_dir_all(&sensai_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .sensai directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the SQLite document store path.
    pub fn index_path(&self) -> PathBuf {
        if self.rag.index_path.is_absolute() {
            self.rag.index_path.clone()
        } else {
            self.workspace.join(&self.rag.index_path)
        }
    }

    /// Resolve the taxonomy override path, if any.
    pub fn taxonomy_path(&self) -> Option<PathBuf> {
        self.rag.taxonomy_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.workspace.join(p)
            }
        })
    }

    /// Validate the configuration before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.llm.provider.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        let embedding = self.rag.embedding_provider.to_lowercase();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&embedding.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.rag.embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        let cascade = self.rag.cascade.trim().to_lowercase().replace('_', "-");
        if !KNOWN_CASCADES.contains(&cascade.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown cascade: {}. Supported: {}",
                self.rag.cascade,
                KNOWN_CASCADES.join(", ")
            )));
        }

        if self.rag.top_k == 0 {
            return Err(AppError::Config("rag.topK must be at least 1".to_string()));
        }

        if self.rag.embedding_dimensions == 0 {
            return Err(AppError::Config(
                "rag.embeddingDimensions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
