//! Text generation behind a provider-neutral trait.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for single-turn text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` with the given model and temperature.
    async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String>;
}
