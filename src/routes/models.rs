//! Model catalog and selection routes.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::services::catalog::{self, ModelInfo};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SelectionBody {
    pub models: Vec<String>,
}

#[derive(Deserialize)]
pub struct ToggleBody {
    pub model: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ToggleResponse {
    pub model: String,
    pub selected: bool,
}

/// `GET /api/models` — cached catalog.
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    let models = state.session.models();
    Json(models.iter().map(|id| ModelInfo::from_id(id)).collect())
}

/// `POST /api/models/refresh` — refetch the catalog from the upstream.
pub async fn refresh_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(catalog::refresh(&state.session, state.llm.as_ref()).await)
}

/// `GET /api/selection` — selected model ids.
pub async fn get_selection(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.session.selection())
}

/// `PUT /api/selection` — replace the selection.
pub async fn put_selection(State(state): State<AppState>, Json(body): Json<SelectionBody>) -> Json<Vec<String>> {
    state.session.set_selection(body.models);
    Json(state.session.selection())
}

/// `POST /api/selection/toggle` — flip one model's membership.
pub async fn toggle_selection(State(state): State<AppState>, Json(body): Json<ToggleBody>) -> Json<ToggleResponse> {
    let selected = state.session.toggle_selection(&body.model);
    Json(ToggleResponse { model: body.model, selected })
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
