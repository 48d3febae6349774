//! JSON API routes and handlers.

mod health;
mod models;
mod personas;
pub mod types;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::state::AppState;

pub use types::{ChatPageResponse, HealthResponse, IndexResponse, ModelsResponse};

/// Create the API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/", get(personas::index))
        .route("/models", get(models::list_models))
        .route("/chat/{persona_id}", get(personas::chat_page))
}
