use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::ingest::DocumentInput;
use crate::state::AppState;
use crate::store::DocumentStatus;

#[derive(Debug, Deserialize)]
pub struct IngestDocumentsRequest {
    pub documents: Vec<DocumentInput>,
}

/// Registers the documents as pending, hands them to the ingestion service
/// and records the outcome. A failed ingestion marks every document in the
/// batch as failed and surfaces the wrapped error.
pub async fn ingest_documents(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
    Json(payload): Json<IngestDocumentsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.documents.is_empty() {
        return Err(ApiError::BadRequest("No documents supplied".to_string()));
    }

    let bot = state
        .store
        .get_bot(&bot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bot not found".to_string()))?;

    let mut records = Vec::with_capacity(payload.documents.len());
    for doc in &payload.documents {
        let record = state
            .store
            .create_document(&bot.id, &doc.filename, guess_mime_type(&doc.filename))
            .await?;
        records.push(record);
    }

    match state.ingest.ingest(&bot.id, &payload.documents).await {
        Ok(response) => {
            // The service reports one embedding count for the whole batch;
            // split it across the documents without losing the remainder.
            let counts = split_chunk_counts(response.upserted_embeddings, records.len());
            for (record, count) in records.iter().zip(counts) {
                state
                    .store
                    .set_document_status(&record.id, DocumentStatus::Completed, count)
                    .await?;
            }

            let documents = state.store.list_documents(&bot.id).await?;
            Ok(Json(json!({
                "documents": documents,
                "upserted_embeddings": response.upserted_embeddings,
            })))
        }
        Err(err) => {
            tracing::error!("Ingestion failed for bot {}: {}", bot.id, err);
            for record in &records {
                state
                    .store
                    .set_document_status(&record.id, DocumentStatus::Failed, 0)
                    .await?;
            }
            Err(ApiError::Upstream(format!("Document ingestion failed: {}", err)))
        }
    }
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state
        .store
        .get_bot(&bot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bot not found".to_string()))?;

    let documents = state.store.list_documents(&bot.id).await?;
    Ok(Json(json!({"documents": documents})))
}

/// Even split of a batch embedding count over `n` documents; the first
/// `total % n` documents absorb the remainder so the counts sum to `total`.
fn split_chunk_counts(total: i64, n: usize) -> Vec<i64> {
    let n_i64 = n as i64;
    let base = total / n_i64;
    let remainder = total % n_i64;

    (0..n_i64)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

fn guess_mime_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(guess_mime_type("faq.md"), "text/markdown");
        assert_eq!(guess_mime_type("page.html"), "text/html");
        assert_eq!(guess_mime_type("notes"), "text/plain");
    }

    #[test]
    fn chunk_counts_preserve_the_batch_total() {
        assert_eq!(split_chunk_counts(14, 3), vec![5, 5, 4]);
        assert_eq!(split_chunk_counts(12, 3), vec![4, 4, 4]);
        assert_eq!(split_chunk_counts(2, 3), vec![1, 1, 0]);

        let counts = split_chunk_counts(14, 3);
        assert_eq!(counts.iter().sum::<i64>(), 14);
    }
}
