use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::provider::CompletionProvider;
use super::types::{clamp_temperature, ChatMessage, Completion};
use crate::core::errors::ApiError;

const DEFAULT_MODEL: &str = "llama2";
const FALLBACK_MODELS: [&str; 4] = ["llama3", "llama2", "mistral", "phi3"];
const MAX_NEW_TOKENS: u32 = 512;
const TOP_K: u32 = 40;
const TOP_P: f64 = 0.9;

/// Client for a local Ollama-compatible inference endpoint.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    preferred_model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, preferred_model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            preferred_model,
            client: Client::new(),
        }
    }

    /// Discover model names from the endpoint. Unreachable endpoints yield
    /// an empty list so model selection can still fall back to the default.
    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let res = match self.client.get(&url).send().await {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!("Ollama model discovery failed: {}", err);
                return Vec::new();
            }
        };

        match res.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(err) => {
                tracing::warn!("Ollama model list malformed: {}", err);
                Vec::new()
            }
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<Completion, ApiError> {
        let available = self.list_models().await;
        let model = select_model(&self.preferred_model, &available);
        let prompt = format_prompt(messages);

        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": clamp_temperature(temperature),
                "num_predict": MAX_NEW_TOKENS,
                "top_k": TOP_K,
                "top_p": TOP_P,
            }
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ApiError::Upstream(format!(
                    "Model '{}' not available (discovered: [{}]): {}",
                    model,
                    available.join(", "),
                    text
                )));
            }
            return Err(ApiError::Upstream(format!(
                "Ollama generate error ({}): {}",
                status, text
            )));
        }

        let payload: GenerateResponse = res.json().await.map_err(ApiError::upstream)?;
        let tokens_used = (payload.response.len() / 4) as u32;

        Ok(Completion {
            text: payload.response,
            tokens_used,
        })
    }
}

/// Ordered model preference: exact requested match, then the fallback list,
/// then the first discovered model, then the hard-coded default.
fn select_model(preferred: &str, available: &[String]) -> String {
    if available.iter().any(|m| m == preferred) {
        return preferred.to_string();
    }

    for fallback in FALLBACK_MODELS {
        if let Some(found) = available
            .iter()
            .find(|m| m.as_str() == fallback || m.starts_with(&format!("{}:", fallback)))
        {
            return found.clone();
        }
    }

    if let Some(first) = available.first() {
        return first.clone();
    }

    DEFAULT_MODEL.to_string()
}

/// Flatten a role-tagged message sequence into a single instruction-format
/// prompt. System and user turns are wrapped in instruction markers,
/// assistant turns continue the transcript as plain text.
fn format_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    for message in messages {
        match message.role.as_str() {
            "assistant" => {
                prompt.push_str(&message.content);
                prompt.push('\n');
            }
            _ => {
                prompt.push_str("[INST] ");
                prompt.push_str(&message.content);
                prompt.push_str(" [/INST]\n");
            }
        }
    }

    prompt.push_str("Assistant:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_wins() {
        let available = models(&["mistral", "custom-model"]);
        assert_eq!(select_model("custom-model", &available), "custom-model");
    }

    #[test]
    fn fallback_list_is_tried_in_order() {
        let available = models(&["mistral", "llama2:7b"]);
        assert_eq!(select_model("missing", &available), "llama2:7b");
    }

    #[test]
    fn first_available_when_no_preference_matches() {
        let available = models(&["some-exotic-model"]);
        assert_eq!(select_model("missing", &available), "some-exotic-model");
    }

    #[test]
    fn default_when_discovery_is_empty() {
        assert_eq!(select_model("missing", &[]), DEFAULT_MODEL);
    }

    #[test]
    fn prompt_wraps_system_and_user_turns() {
        let messages = vec![
            ChatMessage::system("Be helpful."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("What's up?"),
        ];

        let prompt = format_prompt(&messages);
        assert!(prompt.starts_with("[INST] Be helpful. [/INST]\n"));
        assert!(prompt.contains("[INST] Hi [/INST]\nHello!\n"));
        assert!(prompt.ends_with("[INST] What's up? [/INST]\nAssistant:"));
    }
}
