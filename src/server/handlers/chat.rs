use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::bus::ChatEvent;
use crate::core::errors::ApiError;
use crate::llm::ChatMessage;
use crate::state::AppState;
use crate::store::StoredMessage;

const HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// One full chat turn: persist the user message, generate the answer over
/// the session's recent history, persist the assistant message. The two
/// writes are intentionally independent; a crash in between leaves a user
/// message without a reply.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let session = state
        .store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    let bot = state
        .store
        .get_bot(&session.bot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bot not found".to_string()))?;

    // History snapshot before this turn; the generator appends the query
    // itself as the final message.
    let history = state.store.get_messages(&session.id, HISTORY_LIMIT).await?;
    let history = to_chat_messages(&history);

    let user_message = state
        .store
        .create_message(&session.id, "user", content, None)
        .await?;
    publish(&state, &user_message);

    let generated = state
        .generator
        .generate_answer(
            &bot.id,
            content,
            &history,
            bot.temperature,
            state.config.top_k,
        )
        .await?;

    let assistant_message = state
        .store
        .create_message(
            &session.id,
            "assistant",
            &generated.answer,
            Some(generated.tokens_used as i64),
        )
        .await?;
    publish(&state, &assistant_message);

    Ok(Json(json!({
        "answer": generated.answer,
        "citations": generated.citations,
        "tokens_used": generated.tokens_used,
        "message_id": assistant_message.id,
        "session_id": session.id,
    })))
}

fn to_chat_messages(messages: &[StoredMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect()
}

fn publish(state: &AppState, message: &StoredMessage) {
    state.bus.publish(ChatEvent {
        session_id: message.session_id.clone(),
        message_id: message.id.clone(),
        role: message.role.clone(),
        content: message.content.clone(),
    });
}
