use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::vector_store::{QueryResponse, VectorStoreClient};

pub const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SCORE: f64 = 0.5;
const NOT_READY_WAIT_MS: u64 = 500;

/// One retrieved snippet with its provenance. Lives only for the duration
/// of a single answer-generation call.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub filename: String,
    pub document_index: i64,
    pub score: f64,
}

/// Wraps the vector store and normalizes its results. Retrieval never
/// fails: any transport or shape problem degrades to an empty result.
pub struct ContextRetriever {
    store: Arc<VectorStoreClient>,
}

impl ContextRetriever {
    pub fn new(store: Arc<VectorStoreClient>) -> Self {
        Self { store }
    }

    pub async fn retrieve(&self, bot_id: &str, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        if !self.store.is_ready() && !self.store.heartbeat().await {
            // One bounded wait while the store comes up, then try anyway.
            tokio::time::sleep(Duration::from_millis(NOT_READY_WAIT_MS)).await;
        }

        let collection = collection_name(bot_id);
        match self.store.query(&collection, query, top_k).await {
            Ok(response) => chunks_from_response(&response),
            Err(err) => {
                tracing::warn!("Retrieval failed for {}: {}", collection, err);
                Vec::new()
            }
        }
    }
}

/// Each bot's documents live in their own collection.
pub fn collection_name(bot_id: &str) -> String {
    format!("bot_{}", bot_id)
}

/// Map the store's parallel arrays into chunk records. Missing metadata
/// falls back to "unknown"; missing distances fall back to a neutral score.
pub fn chunks_from_response(response: &QueryResponse) -> Vec<RetrievedChunk> {
    let documents = match response.documents.first() {
        Some(docs) => docs,
        None => return Vec::new(),
    };
    let metadatas = response.metadatas.first();
    let distances = response.distances.first();

    documents
        .iter()
        .enumerate()
        .map(|(i, content)| {
            let metadata = metadatas.and_then(|m| m.get(i));
            let filename = metadata
                .and_then(|m| m.get("filename"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let document_index = metadata
                .and_then(|m| m.get("document_index"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let score = distances
                .and_then(|d| d.get(i))
                .copied()
                .unwrap_or(DEFAULT_SCORE);

            RetrievedChunk {
                content: content.clone(),
                filename,
                document_index,
                score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(documents: Vec<&str>, metadatas: Vec<serde_json::Value>, distances: Option<Vec<f64>>) -> QueryResponse {
        QueryResponse {
            documents: vec![documents.into_iter().map(String::from).collect()],
            metadatas: vec![metadatas],
            distances: distances.map(|d| vec![d]).unwrap_or_default(),
        }
    }

    #[test]
    fn maps_parallel_arrays_in_order() {
        let res = response(
            vec!["first chunk", "second chunk"],
            vec![
                json!({"filename": "faq.md", "document_index": 0}),
                json!({"filename": "policy.md", "document_index": 2}),
            ],
            Some(vec![0.12, 0.34]),
        );

        let chunks = chunks_from_response(&res);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "first chunk");
        assert_eq!(chunks[0].filename, "faq.md");
        assert_eq!(chunks[0].score, 0.12);
        assert_eq!(chunks[1].document_index, 2);
        assert_eq!(chunks[1].score, 0.34);
    }

    #[test]
    fn missing_metadata_and_distances_use_defaults() {
        let res = response(vec!["orphan chunk"], vec![], None);

        let chunks = chunks_from_response(&res);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].filename, "unknown");
        assert_eq!(chunks[0].document_index, 0);
        assert_eq!(chunks[0].score, 0.5);
    }

    #[test]
    fn fewer_results_than_requested_are_returned_as_is() {
        let res = response(
            vec!["only one"],
            vec![json!({"filename": "doc.txt"})],
            Some(vec![0.9]),
        );
        assert_eq!(chunks_from_response(&res).len(), 1);
    }

    #[test]
    fn empty_response_yields_no_chunks() {
        assert!(chunks_from_response(&QueryResponse::default()).is_empty());
    }

    #[test]
    fn collection_names_are_bot_scoped() {
        assert_eq!(collection_name("abc-123"), "bot_abc-123");
    }
}
