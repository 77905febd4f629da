use async_trait::async_trait;

use super::provider::CompletionProvider;
use super::types::{ChatMessage, Completion};
use crate::core::errors::ApiError;

/// Placeholder cloud provider. Intentionally disabled: every completion
/// call fails with a fixed explanation so deployments that select it by
/// mistake surface a clear error instead of silently degrading.
pub struct OpenAiProvider;

impl OpenAiProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
    ) -> Result<Completion, ApiError> {
        Err(ApiError::Upstream(
            "OpenAI provider is not enabled in this deployment; configure 'ollama' or 'mock'"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_fails_with_explanation() {
        let provider = OpenAiProvider::new();
        let err = provider
            .complete(&[ChatMessage::user("hi")], 0.3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not enabled"));
    }
}
