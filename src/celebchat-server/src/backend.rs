//! Model backend abstraction used by the HTTP layer.

use async_trait::async_trait;
use celebchat_ollama::{ByteStream, OllamaClient};

/// The capabilities the server needs from a model backend.
#[async_trait]
pub trait ModelBackend: Send + Sync + 'static {
    /// Names of the available models, failing if the listing cannot be made.
    async fn fetch_models(&self) -> celebchat_ollama::Result<Vec<String>>;

    /// Names of the available models; empty when the listing fails.
    async fn list_models(&self) -> Vec<String>;

    /// Start a generation and return the raw NDJSON body.
    async fn generate(&self, model: &str, prompt: &str) -> celebchat_ollama::Result<ByteStream>;

    /// Human readable location of the backend, for logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn fetch_models(&self) -> celebchat_ollama::Result<Vec<String>> {
        let models = OllamaClient::fetch_models(self).await?;
        Ok(models.into_iter().map(|m| m.name).collect())
    }

    async fn list_models(&self) -> Vec<String> {
        OllamaClient::list_models(self).await
    }

    async fn generate(&self, model: &str, prompt: &str) -> celebchat_ollama::Result<ByteStream> {
        OllamaClient::generate(self, model, prompt).await
    }

    fn describe(&self) -> String {
        self.base_url().to_string()
    }
}
