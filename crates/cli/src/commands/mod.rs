//! Command handlers for the SENSAI CLI.

pub mod analyze;
pub mod ask;
pub mod import;
pub mod key_points;
pub mod search;
pub mod serve;
pub mod stats;

pub use analyze::AnalyzeCommand;
pub use ask::AskCommand;
pub use import::ImportCommand;
pub use key_points::KeyPointsCommand;
pub use search::SearchCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
