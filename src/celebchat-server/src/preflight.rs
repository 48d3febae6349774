//! Startup check that the model backend answers.

use celebchat_ollama::OllamaError;
use tracing::{error, info, warn};

use crate::backend::ModelBackend;

/// List the backend's models once before the server starts accepting requests.
///
/// An empty listing is only a warning: every persona then falls back to the
/// default model. A listing that fails outright is an error.
pub async fn check_available(backend: &dyn ModelBackend) -> Result<Vec<String>, OllamaError> {
    let location = backend.describe();
    info!("Checking model backend at {}", location);

    let models = match backend.fetch_models().await {
        Ok(models) => models,
        Err(e) => {
            error!("Model backend at {} is not available: {}", location, e);
            return Err(e);
        }
    };

    if models.is_empty() {
        warn!("Backend is up but has no models installed");
    } else {
        info!("{} model(s) available:", models.len());
        for (index, name) in models.iter().enumerate() {
            info!("  {}. {}", index + 1, name);
        }
    }

    Ok(models)
}
