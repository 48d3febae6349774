//! Ollama client for celebchat
//!
//! This crate talks to a locally hosted Ollama server: it lists the models the
//! server has pulled (`/api/tags`) and starts streaming generations
//! (`/api/generate`). Generation bodies are handed back unparsed so callers can
//! relay the NDJSON stream however they need.

mod client;
mod models;

pub use client::{ByteStream, OllamaClient};
pub use models::{GenerateRequest, GenerationEvent, ModelTag, TagsResponse};

/// Default Ollama server URL
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model used when no persona preference is available on the server
pub const DEFAULT_MODEL: &str = "gpt-oss:20b";

/// Error types for Ollama operations
#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("Ollama is not reachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status}: {body}")]
    Server {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OllamaError {
    /// Whether the failure happened before any HTTP exchange took place.
    ///
    /// These are worth retrying from the user's side (start Ollama, try again).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Result type for Ollama operations
pub type Result<T> = std::result::Result<T, OllamaError>;
