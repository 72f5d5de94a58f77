//! LLM provider factory.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client from a provider name.
///
/// # Arguments
/// * `provider` - Provider identifier (currently only "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout_secs` - Per-request timeout
///
/// # Errors
/// Returns a message naming the provider if it is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout_secs: u64,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://127.0.0.1:11434");
            let client = OllamaClient::with_timeout(base_url, Duration::from_secs(timeout_secs));
            Ok(Arc::new(client))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}
