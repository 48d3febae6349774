//! Model listing endpoint.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::state::AppState;

use super::types::ModelsResponse;

/// List the models the backend has installed. Empty when it cannot be reached.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.backend.list_models().await,
    })
}
