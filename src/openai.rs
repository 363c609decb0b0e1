//! OpenAI-compatible client configuration.

use crate::config::LlmSettings;
use crate::error::{GalleryError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a client for the configured endpoint with its request timeout.
///
/// The API key is read from the environment variable named in the settings; when
/// that variable is unset the library default (`OPENAI_API_KEY`) applies.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| GalleryError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base);
    }
    if let Ok(key) = std::env::var(&settings.api_key_env) {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
