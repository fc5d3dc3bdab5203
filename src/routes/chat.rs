//! Chat, conversation, and draft routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::routes::error_response;
use crate::services::conversation::Turn;
use crate::services::dispatch::{self, Scope};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    /// Falls back to the stored draft for the scope when absent.
    pub prompt: Option<String>,
    /// Reply to one model's thread instead of the selection.
    pub model: Option<String>,
    /// Explicit targets; defaults to the selection or `model`.
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct DraftBody {
    pub model: Option<String>,
    pub text: String,
}

/// `POST /api/chat` — dispatch a prompt and return the receipt.
pub async fn post_chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    let scope = body.model.map_or(Scope::Global, Scope::PerModel);
    match dispatch::submit(&state.session, &state.llm, body.prompt.as_deref(), scope, body.targets) {
        Ok(dispatched) => (StatusCode::ACCEPTED, Json(dispatched.receipt())).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

/// `GET /api/conversation` — the full log.
pub async fn get_conversation(State(state): State<AppState>) -> Json<Vec<Turn>> {
    Json(state.session.turns())
}

/// `GET /api/conversation/{*model}` — one model's private thread.
pub async fn get_projection(State(state): State<AppState>, Path(model): Path<String>) -> Json<Vec<Turn>> {
    Json(state.session.project(&model))
}

/// `GET /api/busy` — models with an unfinished exchange.
pub async fn get_busy(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.session.busy_models())
}

/// `PUT /api/drafts` — store prompt or reply box text.
pub async fn put_draft(State(state): State<AppState>, Json(body): Json<DraftBody>) -> StatusCode {
    state.session.set_draft(body.model.as_deref(), body.text);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
