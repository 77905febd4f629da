use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;

/// HTTP client for the vector store used for similarity search. The store
/// keeps one collection per bot; queries return parallel arrays of chunk
/// texts, metadata objects and distances.
pub struct VectorStoreClient {
    base_url: String,
    client: Client,
    ready: AtomicBool,
}

/// Raw similarity-query response. All arrays are nested one level because
/// the store supports batched query texts; we always send exactly one.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub distances: Vec<Vec<f64>>,
}

impl VectorStoreClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the store has answered a heartbeat at least once.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub async fn heartbeat(&self) -> bool {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let ok = matches!(
            self.client.get(&url).send().await,
            Ok(res) if res.status().is_success()
        );
        if ok {
            self.ready.store(true, Ordering::Relaxed);
        }
        ok
    }

    pub async fn query(
        &self,
        collection: &str,
        query_text: &str,
        n_results: usize,
    ) -> Result<QueryResponse, ApiError> {
        let url = format!("{}/query", self.base_url);
        let body = json!({
            "collection": collection,
            "queryTexts": [query_text],
            "nResults": n_results,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Vector store query failed ({}): {}",
                status, text
            )));
        }

        self.ready.store(true, Ordering::Relaxed);
        res.json::<QueryResponse>().await.map_err(ApiError::upstream)
    }
}
