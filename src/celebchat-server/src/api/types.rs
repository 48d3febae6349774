//! API request and response types.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::auth::Identity;
use crate::persona::Persona;

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// Personas
// ============================================================================

/// Data behind the persona picker.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub personas: Vec<Persona>,
    /// Persona id to the model it is answered with right now.
    pub models: BTreeMap<String, String>,
}

/// Data behind a persona's chat page.
#[derive(Debug, Serialize)]
pub struct ChatPageResponse {
    pub personas: Vec<Persona>,
    pub selected: Persona,
    pub selected_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

// ============================================================================
// Models
// ============================================================================

/// Raw model listing of the backend.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}
