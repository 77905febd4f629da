use std::sync::Arc;

use async_trait::async_trait;

use super::mock::MockProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;
use super::types::{ChatMessage, Completion};
use crate::core::config::AppConfig;
use crate::core::errors::ApiError;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// return the provider name (e.g. "ollama", "openai", "mock")
    fn name(&self) -> &str;

    /// single-shot completion over an ordered, role-tagged message sequence
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<Completion, ApiError>;
}

/// Map the configured provider name to an implementation. This is the only
/// dispatch point; the choice is made once at startup.
pub fn provider_from_config(config: &AppConfig) -> Arc<dyn CompletionProvider> {
    match config.provider.as_str() {
        "ollama" | "local" => Arc::new(OllamaProvider::new(
            config.ollama_url.clone(),
            config.model.clone(),
        )),
        "openai" => Arc::new(OpenAiProvider::new()),
        "mock" => Arc::new(MockProvider::new()),
        other => {
            tracing::warn!("Unknown provider '{}', falling back to mock", other);
            Arc::new(MockProvider::new())
        }
    }
}
