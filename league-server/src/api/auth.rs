//! Shared-secret authentication middleware for administrative routes
//!
//! The JSON body must carry `timestamp` (Unix ms) and `hash`; see
//! `league_common::api::auth` for the hash scheme. A secret of 0 disables the
//! check entirely.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use league_common::api::auth::{validate_request, ApiAuthError};
use league_common::time::unix_millis;
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

/// Largest admin request body accepted
const MAX_AUTH_BODY_BYTES: usize = 64 * 1024;

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_AUTH_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let now_ms = unix_millis(state.engine.now());
    validate_request(&json_value, state.shared_secret, now_ms, state.auth_window).map_err(
        |e| match e {
            ApiAuthError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
            ApiAuthError::InvalidHash { provided, calculated } => {
                warn!(
                    "Hash validation failed: provided={}, calculated={}",
                    provided, calculated
                );
                AuthError::InvalidHash
            }
            ApiAuthError::MissingField(field) => AuthError::MissingField(field),
            other => AuthError::Other(other.to_string()),
        },
    )?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

/// Authentication failures
#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidHash,
    MissingField(&'static str),
    ParseError(String),
    Other(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AuthError::InvalidTimestamp(reason) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                format!("Invalid timestamp: {}", reason),
            ),
            AuthError::InvalidHash => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "Invalid hash".to_string(),
            ),
            AuthError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "InvalidInput",
                format!("Missing required field: {}", field),
            ),
            AuthError::ParseError(msg) => (
                StatusCode::BAD_REQUEST,
                "InvalidInput",
                format!("Parse error: {}", msg),
            ),
            AuthError::Other(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal",
                format!("Authentication error: {}", msg),
            ),
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}
