//! Completion client implementations for Pili.
//!
//! One implementation covers the vast majority of backends: anything that
//! exposes an OpenAI-compatible `/chat/completions` endpoint (OpenAI,
//! Ollama, vLLM, Together, ...).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use pili_core::CompletionClient;
use pili_config::LlmConfig;
use std::sync::Arc;

/// Build the configured completion client.
pub fn from_config(config: &LlmConfig) -> Arc<dyn CompletionClient> {
    let timeout = std::time::Duration::from_secs(config.request_timeout_secs);
    match config.provider.as_str() {
        "local" => Arc::new(OpenAiCompatClient::new(
            "local",
            config
                .base_url
                .as_deref()
                .unwrap_or("http://localhost:11434/v1"),
            config.api_key.as_deref().unwrap_or("not-required"),
            timeout,
        )),
        // Validation guarantees the only other value is "openai".
        _ => Arc::new(OpenAiCompatClient::new(
            "openai",
            "https://api.openai.com/v1",
            config.api_key.as_deref().unwrap_or_default(),
            timeout,
        )),
    }
}
