use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::events::session_stream;
use crate::server::handlers::{bots, chat, documents, health, sessions};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/bots", post(bots::create_bot))
        .route("/api/bots/:bot_id", get(bots::get_bot))
        .route(
            "/api/bots/:bot_id/documents",
            get(documents::list_documents).post(documents::ingest_documents),
        )
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route(
            "/api/sessions/:session_id/messages",
            get(sessions::get_session_messages).post(chat::send_message),
        )
        .route("/api/sessions/:session_id/stream", get(session_stream))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}
