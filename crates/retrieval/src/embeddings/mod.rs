//! Query and passage embedding.
//!
//! The document stores embed the text they are asked to search for; the
//! provider behind them is chosen by `rag.embeddingProvider`.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
