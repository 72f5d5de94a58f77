//! SENSAI CLI
//!
//! Entry point for the `sensai` binary: the HTTP service plus commands for
//! querying, inspecting and filling the curriculum document store.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AnalyzeCommand, AskCommand, ImportCommand, KeyPointsCommand, SearchCommand, ServeCommand,
    StatsCommand,
};
use sensai_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// SENSAI - curriculum-aware retrieval and tutoring service
#[derive(Parser, Debug)]
#[command(name = "sensai")]
#[command(about = "Curriculum-aware hybrid retrieval for student questions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SENSAI_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SENSAI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider
    #[arg(short, long, global = true, env = "SENSAI_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "SENSAI_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeCommand),

    /// Answer one question
    Ask(AskCommand),

    /// Run the retrieval cascade and print the context
    Search(SearchCommand),

    /// Show how a query maps onto the taxonomy
    Analyze(AnalyzeCommand),

    /// Load JSON-lines passages into the document store
    Import(ImportCommand),

    /// Extract the key points of a curriculum file
    KeyPoints(KeyPointsCommand),

    /// Show document store statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Serve(_) => "serve",
            Commands::Ask(_) => "ask",
            Commands::Search(_) => "search",
            Commands::Analyze(_) => "analyze",
            Commands::Import(_) => "import",
            Commands::KeyPoints(_) => "key-points",
            Commands::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let json_logs = matches!(&cli.command, Commands::Serve(cmd) if cmd.json_logs);
    logging::init_logging(config.log_level.as_deref(), config.no_color, json_logs)?;

    tracing::info!("SENSAI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {} ({})", config.llm.provider, config.llm.model);

    config.validate()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Analyze(cmd) => cmd.execute(&config),
        Commands::Import(cmd) => cmd.execute(&config).await,
        Commands::KeyPoints(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
