//! Error types for SENSAI.
//!
//! A single error enum covers every category the service distinguishes:
//! configuration (fatal at startup), taxonomy data, document store and
//! LLM collaborator failures, prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for SENSAI.
///
/// Lookup misses are never represented here: a retrieval strategy that
/// finds nothing returns an empty result set.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM and embedding provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Malformed taxonomy data
    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
