//! Celebchat server - chat with historical personas, answered by a local
//! Ollama server.
//!
//! This crate provides:
//! - The persona registry and per-persona model selection
//! - Persona prompt construction
//! - A streaming relay that forwards generated text to the browser as it is
//!   produced
//! - JSON endpoints for the persona picker, the chat page and health checks
//! - Optional JWT identity checks
//!
//! Model availability is checked once at startup; the server refuses to
//! start when the backend cannot be reached.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod ndjson;
pub mod persona;
pub mod preflight;
pub mod prompt;
pub mod relay;
pub mod state;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use backend::ModelBackend;
pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use persona::{Persona, PersonaRegistry};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
///
/// Fails before binding when the model backend cannot be listed.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if config.auth.enabled && config.auth.jwt_secret.is_none() {
        anyhow::bail!("authentication is enabled but no JWT secret is configured");
    }
    if !config.auth.enabled {
        warn!("Server running without authentication!");
    }

    let addr: SocketAddr = config.listen_addr.parse()?;
    let grace = Duration::from_secs(config.shutdown_timeout);
    let state = Arc::new(AppState::new(config));

    preflight::check_available(state.backend.as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("model backend check failed: {e}"))?;

    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Celebchat server listening on {}", listener.local_addr()?);

    // Open streams can outlive the shutdown signal; they get `grace` to finish.
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            if signalled_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace).await;
        } => {
            warn!("Shutdown timeout of {}s elapsed, dropping open streams", grace.as_secs());
        }
    }

    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let routes = api::routes().merge(relay::routes());

    Router::new()
        .merge(routes)
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::identity_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::timing_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer(&state.config.cors_origins))
        .with_state(state)
}
