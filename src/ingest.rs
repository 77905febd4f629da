use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

const DEFAULT_CHUNK_SIZE: u32 = 600;
const DEFAULT_OVERLAP: u32 = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub filename: String,
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestionRequest<'a> {
    bot_id: &'a str,
    documents: &'a [DocumentInput],
    chunk_size: u32,
    overlap: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResponse {
    pub bot_id: String,
    pub upserted_embeddings: i64,
    pub documents: i64,
}

/// Client for the external ingestion service, which chunks and embeds
/// documents into the bot's vector-store collection.
#[derive(Clone)]
pub struct IngestClient {
    base_url: String,
    client: Client,
}

impl IngestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn ingest(
        &self,
        bot_id: &str,
        documents: &[DocumentInput],
    ) -> Result<IngestionResponse, ApiError> {
        let url = format!("{}/ingest", self.base_url);
        let body = IngestionRequest {
            bot_id,
            documents,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("Ingestion service unreachable: {}", err)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Ingestion failed ({}): {}",
                status, text
            )));
        }

        res.json::<IngestionResponse>()
            .await
            .map_err(|err| ApiError::Upstream(format!("Ingestion response malformed: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let documents = vec![DocumentInput {
            filename: "faq.md".to_string(),
            text: "Shipping is free over $50.".to_string(),
        }];
        let request = IngestionRequest {
            bot_id: "bot-1",
            documents: &documents,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["botId"], "bot-1");
        assert_eq!(value["chunkSize"], 600);
        assert_eq!(value["overlap"], 80);
        assert_eq!(value["documents"][0]["filename"], "faq.md");
    }

    #[test]
    fn response_parses_camel_case_keys() {
        let raw = r#"{"botId": "bot-1", "upsertedEmbeddings": 14, "documents": 2}"#;
        let response: IngestionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.upserted_embeddings, 14);
        assert_eq!(response.documents, 2);
    }
}
