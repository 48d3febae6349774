//! Caller identity.
//!
//! Tokens are issued by the account service; this module only verifies them
//! and exposes who is calling.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// JWT claims as issued by the account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (numeric or string depending on the user store).
    pub id: serde_json::Value,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// User role.
    #[serde(default)]
    pub rol: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: u64,
}

/// Authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        let user_id = match claims.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Self {
            user_id,
            email: claims.email,
            name: claims.name,
            role: claims.rol,
        }
    }
}

/// Parse Bearer token from Authorization header.
pub fn parse_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Find a cookie value in the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Token carried by the request: Authorization header first, then cookie.
pub fn extract_token<'a>(headers: &'a HeaderMap, config: &AuthConfig) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer_token)
        .or_else(|| cookie_value(headers, &config.cookie_name))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify an HS256 token.
pub fn verify_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Authentication(format!("Invalid or expired token: {e}")))?;
    Ok(data.claims.into())
}

/// Attach the caller's [`Identity`] to the request when it carries a valid
/// token. With authentication enabled, requests outside the anonymous
/// endpoints are rejected without one.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = &state.config.auth;
    let anonymous = config
        .anonymous_endpoints
        .iter()
        .any(|p| request.uri().path().starts_with(p.as_str()));

    let identity = match (extract_token(request.headers(), config), &config.jwt_secret) {
        (Some(token), Some(secret)) => match verify_token(token, secret) {
            Ok(identity) => Some(identity),
            Err(e) if config.enabled && !anonymous => {
                tracing::warn!("Rejected token: {}", e);
                return Err(e);
            }
            Err(_) => None,
        },
        (Some(_), None) if config.enabled => {
            tracing::error!("JWT secret not configured but auth is enabled");
            return Err(AppError::Internal("authentication is misconfigured".into()));
        }
        _ => None,
    };

    if config.enabled && !anonymous && identity.is_none() {
        return Err(AppError::Authentication(
            "You must sign in to access this route".into(),
        ));
    }

    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}
