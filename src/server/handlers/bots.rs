use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    pub workspace_id: String,
    pub name: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

pub async fn create_bot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Bot name must not be empty".to_string()));
    }

    let provider = payload
        .provider
        .unwrap_or_else(|| state.config.provider.clone());
    let model = payload.model.unwrap_or_else(|| state.config.model.clone());

    let bot = state
        .store
        .create_bot(
            &payload.workspace_id,
            payload.name.trim(),
            &provider,
            &model,
            payload.temperature,
        )
        .await?;

    Ok(Json(json!({"bot": bot})))
}

pub async fn get_bot(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state
        .store
        .get_bot(&bot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bot not found".to_string()))?;

    Ok(Json(json!({"bot": bot})))
}
