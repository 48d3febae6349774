//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use celebchat_ollama::OllamaClient;

use crate::backend::ModelBackend;
use crate::config::ServerConfig;
use crate::persona::PersonaRegistry;

/// Application state shared across request handlers.
///
/// Nothing in here is mutated after startup.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Personas and their model preferences.
    pub personas: PersonaRegistry,
    /// Model backend.
    pub backend: Arc<dyn ModelBackend>,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("personas", &self.personas.len())
            .field("backend", &self.backend.describe())
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create state talking to the Ollama server named in the configuration.
    pub fn new(config: ServerConfig) -> Self {
        let client = OllamaClient::with_timeouts(
            config.backend.base_url.clone(),
            config.backend.connect_timeout_duration(),
            config.backend.list_timeout_duration(),
        );
        Self::with_backend(config, Arc::new(client))
    }

    /// Create state with an explicit backend and the built-in personas.
    pub fn with_backend(config: ServerConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            config,
            personas: PersonaRegistry::builtin(),
            backend,
            start_time: Instant::now(),
        }
    }

    /// Model used when a persona has no available preference.
    pub fn default_model(&self) -> &str {
        &self.config.backend.default_model
    }

    /// Get uptime duration.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
