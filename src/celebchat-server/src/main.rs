//! Celebchat server binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use celebchat_server::{ServerConfig, run_with_shutdown};

/// Celebchat Server
#[derive(Parser)]
#[command(name = "celebchat-server")]
#[command(about = "Chat with historical personas through a local Ollama server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address (overrides the configuration)
    #[arg(short, long)]
    listen: Option<String>,

    /// Ollama base URL (overrides the configuration)
    #[arg(long)]
    backend_url: Option<String>,

    /// Log level (defaults to the configured level)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => ServerConfig::load(path)
            .map_err(|e| format!("Failed to load config from {path}: {e}")),
        None => ServerConfig::from_env()
            .map_err(|e| format!("Failed to load config from environment: {e}")),
    };

    // Logging comes up before the config error is reported so it reaches the log.
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let level = args.log_level.as_deref().unwrap_or(&logging.level);
    setup_logging(level, args.json_logs || logging.format == "json");

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(url) = args.backend_url {
        config.backend.base_url = url;
    }

    info!("Starting Celebchat server on {}", config.listen_addr);
    info!("Model backend: {}", config.backend.base_url);
    info!("Default model: {}", config.backend.default_model);
    if config.debug_prompts {
        info!("Prompt debugging enabled");
    }

    let shutdown_timeout = config.shutdown_timeout;

    let shutdown = async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, shutting down (timeout: {}s)...", shutdown_timeout);
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down (timeout: {}s)...", shutdown_timeout);
            }
        }
    };

    if let Err(e) = run_with_shutdown(config, shutdown).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
