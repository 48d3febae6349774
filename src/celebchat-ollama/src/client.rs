//! Ollama client implementation

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};

use crate::models::{GenerateRequest, ModelTag, TagsResponse};
use crate::{DEFAULT_OLLAMA_URL, OllamaError, Result};

/// Raw body of a generation response, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for interacting with an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    list_timeout: Duration,
}

impl OllamaClient {
    /// Create a new client for the given base URL (e.g. "http://localhost:11434").
    ///
    /// No request is made here; use [`OllamaClient::fetch_models`] to probe the
    /// server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LIST_TIMEOUT)
    }

    /// Create a new client with the default URL
    pub fn new_default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }

    /// Create a client with explicit timeouts.
    ///
    /// `connect_timeout` applies to every request. `list_timeout` bounds the
    /// whole catalog request. Generations have no overall timeout since their
    /// length is unpredictable.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        list_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            list_timeout,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Fetch the models the server has available, propagating any failure.
    pub async fn fetch_models(&self) -> Result<Vec<ModelTag>> {
        let url = self.url("/api/tags");
        let response = self
            .client
            .get(&url)
            .timeout(self.list_timeout)
            .send()
            .await
            .map_err(|source| OllamaError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Server { status, body });
        }

        let bytes = response.bytes().await?;
        let tags: TagsResponse = serde_json::from_slice(&bytes)?;
        Ok(tags.models)
    }

    /// List model names, treating every failure as "no models".
    ///
    /// Callers resolve personas against the result, so an unreachable server
    /// simply means every persona falls back to the default model.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                tracing::error!("Failed to list Ollama models: {}", e);
                Vec::new()
            }
        }
    }

    /// Start a generation and return the NDJSON body as an open byte stream.
    ///
    /// The stream is not parsed or buffered here.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<ByteStream> {
        let url = self.url("/api/generate");
        let request = GenerateRequest::new(model, prompt);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| OllamaError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Server { status, body });
        }

        tracing::debug!(model, "Generation stream opened");
        Ok(Box::pin(response.bytes_stream().map_err(OllamaError::from)))
    }
}
