//! Wire types for the Ollama HTTP API

use serde::{Deserialize, Serialize};

/// One entry of the `/api/tags` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTag {
    /// Full model name including its tag (e.g. "llama3:8b")
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
    /// Content digest
    #[serde(default)]
    pub digest: String,
    /// Last modification timestamp as reported by the server
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model to generate with
    pub model: String,
    /// Prompt text
    pub prompt: String,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// One NDJSON record of a generation stream.
///
/// Only `response` has to have a fixed type. Other fields are ignored or kept
/// as raw JSON, so an unexpected value next to the text never loses it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationEvent {
    /// Incremental text fragment
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the final record
    #[serde(default)]
    pub done: Option<serde_json::Value>,
    /// Error reported inline by the server, in whatever shape it was sent
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl GenerationEvent {
    /// Text fragment carried by this record, if it is non-empty
    pub fn fragment(&self) -> Option<&str> {
        self.response.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_done(&self) -> bool {
        matches!(self.done, Some(serde_json::Value::Bool(true)))
    }

    /// Inline error as text, if one was reported
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
