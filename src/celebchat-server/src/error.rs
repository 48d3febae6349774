//! Error types for the chat server.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use celebchat_ollama::OllamaError;
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request input.
    #[error("Invalid {0}")]
    BadRequest(String),

    /// Model backend could not be reached.
    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    /// Model backend answered with an error.
    #[error("Model backend error: {0}")]
    Backend(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_failed",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unavailable(_) => "service_unavailable",
            Self::Backend(_) => "backend_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Render as a short plain-text response.
    ///
    /// Used by the chat stream endpoint, whose successful responses are plain
    /// text as well.
    pub fn into_plain_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for the chat server.
pub type AppResult<T> = Result<T, AppError>;

impl From<OllamaError> for AppError {
    fn from(error: OllamaError) -> Self {
        if error.is_unreachable() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Backend(error.to_string())
        }
    }
}
