//! Persona picker and chat page data.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::auth::Identity;
use crate::catalog;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::types::{ChatPageResponse, IndexResponse};

/// Every persona with the model currently resolved for it.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<IndexResponse> {
    let available = state.backend.list_models().await;
    let models = catalog::resolve_models(&state.personas, &available, state.default_model());

    Json(IndexResponse {
        personas: state.personas.personas().copied().collect(),
        models,
    })
}

/// Context for one persona's chat page.
pub async fn chat_page(
    State(state): State<Arc<AppState>>,
    Path(persona_id): Path<String>,
    identity: Option<Extension<Identity>>,
) -> AppResult<Json<ChatPageResponse>> {
    let selected = *state
        .personas
        .get(&persona_id)
        .ok_or_else(|| AppError::NotFound("Persona".into()))?;

    let available = state.backend.list_models().await;
    let model = catalog::resolve_for(
        &state.personas,
        &persona_id,
        &available,
        state.default_model(),
    )
    .unwrap_or_else(|| state.default_model().to_string());

    Ok(Json(ChatPageResponse {
        personas: state.personas.personas().copied().collect(),
        selected,
        selected_id: persona_id,
        model,
        user: identity.map(|Extension(identity)| identity),
    }))
}
