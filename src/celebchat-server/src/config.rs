//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:5000").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Model backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Log persona prompts for every chat request.
    #[serde(default)]
    pub debug_prompts: bool,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// CORS origins (empty = allow all).
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_body_size() -> usize {
    64 * 1024 // chat messages are short
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            debug_prompts: false,
            max_body_size: default_max_body_size(),
            cors_origins: vec![],
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables (and a `.env` file, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CELEBCHAT_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(url) = std::env::var("OLLAMA_API") {
            config.backend.base_url = url;
        }

        if let Ok(model) = std::env::var("DEFAULT_MODEL")
            && !model.trim().is_empty()
        {
            config.backend.default_model = model;
        }

        if let Ok(flag) = std::env::var("DEBUG_PROMPTS") {
            config.debug_prompts = flag == "1";
        }

        if let Ok(enabled) = std::env::var("CELEBCHAT_AUTH_ENABLED") {
            config.auth.enabled = parse_flag("CELEBCHAT_AUTH_ENABLED", &enabled)?;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.auth.jwt_secret = Some(secret);
        }

        if let Ok(size) = std::env::var("CELEBCHAT_MAX_BODY_SIZE") {
            config.max_body_size = size.parse()?;
        }

        Ok(config)
    }
}

/// Parse an on/off environment value.
fn parse_flag(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{name}: expected a boolean, got {other:?}"),
    }
}

/// Model backend (Ollama) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Model used when none of a persona's preferences is available.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Connect timeout in seconds for every backend request.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Timeout in seconds for the model listing request.
    #[serde(default = "default_list_timeout")]
    pub list_timeout: u64,
}

fn default_backend_url() -> String {
    celebchat_ollama::DEFAULT_OLLAMA_URL.to_string()
}

fn default_model() -> String {
    celebchat_ollama::DEFAULT_MODEL.to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_list_timeout() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            default_model: default_model(),
            connect_timeout: default_connect_timeout(),
            list_timeout: default_list_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn list_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.list_timeout)
    }
}

/// Authentication configuration.
///
/// Tokens are issued elsewhere; this server only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Reject requests without a valid token.
    #[serde(default)]
    pub enabled: bool,
    /// HS256 secret shared with the token issuer.
    pub jwt_secret: Option<String>,
    /// Cookie consulted when no Authorization header is sent.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Path prefixes reachable without a token.
    #[serde(default = "default_anonymous_endpoints")]
    pub anonymous_endpoints: Vec<String>,
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_anonymous_endpoints() -> Vec<String> {
    vec!["/health".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: None,
            cookie_name: default_cookie_name(),
            anonymous_endpoints: default_anonymous_endpoints(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json or pretty).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
