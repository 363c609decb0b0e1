//! OpenAI-compatible text generation.

use super::TextGenerator;
use crate::config::LlmSettings;
use crate::error::{GalleryError, Result};
use crate::openai::create_client;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Generator backed by a chat completions endpoint.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
}

impl OpenAIGenerator {
    /// Create a generator for the configured endpoint.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| GalleryError::Llm(e.to_string()))?
                .into()])
            .temperature(temperature)
            .build()
            .map_err(|e| GalleryError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GalleryError::OpenAI(format!("Generation failed: {}", e)))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| GalleryError::Llm("Empty response from LLM".to_string()))?;

        debug!("Generated {} characters", text.len());
        Ok(text)
    }
}
