//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the REST and websocket endpoints that expose the chat
//! session to browsers. When a static directory is configured it is served as
//! the fallback so the UI and the API share one origin.

pub mod chat;
pub mod models;
pub mod ws;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::frame::{ErrorCode, FRAME_CODE, FRAME_MESSAGE, FRAME_RETRYABLE};
use crate::state::AppState;

/// API routes plus an optional static UI fallback.
pub fn app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/models", get(models::list_models))
        .route("/api/models/refresh", post(models::refresh_models))
        .route("/api/selection", get(models::get_selection).put(models::put_selection))
        .route("/api/selection/toggle", post(models::toggle_selection))
        .route("/api/conversation", get(chat::get_conversation))
        .route("/api/conversation/{*model}", get(chat::get_projection))
        .route("/api/busy", get(chat::get_busy))
        .route("/api/drafts", put(chat::put_draft))
        .route("/api/chat", post(chat::post_chat))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// JSON error body carrying the same fields as a websocket error frame.
pub(crate) fn error_response(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Response {
    let body = json!({
        FRAME_CODE: err.error_code(),
        FRAME_MESSAGE: err.to_string(),
        FRAME_RETRYABLE: err.retryable(),
    });
    (status, Json(body)).into_response()
}
