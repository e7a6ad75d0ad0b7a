// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! Provider-specific error shapes are translated into this taxonomy at the
//! adapter boundary; nothing Google- or Facebook-specific leaks past it.

use crate::models::Platform;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, invalid, expired, or wrong-type session token. Always surfaced
    /// uniformly so callers cannot probe which check failed.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Provider did not supply a mandatory identity field (e.g. email).
    #[error("Provider did not supply required attribute: {0}")]
    MissingUpstreamAttribute(&'static str),

    /// No stored credential for the requested platform.
    #[error("No {0} credentials stored for this user")]
    CredentialsUnavailable(Platform),

    /// Stored credential is unrefreshable; the caller must redo the OAuth flow.
    #[error("{0} credentials are invalid or expired, re-authentication required")]
    ReAuthenticationRequired(Platform),

    /// Transient provider failure (network, timeout, 5xx). Safe for the
    /// caller to retry; never retried internally to avoid duplicate uploads.
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Credential store unavailable. Deliberately distinct from NotFound so a
    /// store outage is never conflated with "user does not exist".
    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::MissingUpstreamAttribute(field) => (
                StatusCode::BAD_REQUEST,
                "missing_upstream_attribute",
                Some(field.to_string()),
            ),
            AppError::CredentialsUnavailable(platform) => (
                StatusCode::BAD_REQUEST,
                "credentials_unavailable",
                Some(platform.to_string()),
            ),
            AppError::ReAuthenticationRequired(platform) => (
                StatusCode::UNAUTHORIZED,
                "reauthentication_required",
                Some(platform.to_string()),
            ),
            AppError::Upstream(msg) => {
                (StatusCode::BAD_GATEWAY, "upstream_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Conflict("username".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::CredentialsUnavailable(Platform::Google)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ReAuthenticationRequired(Platform::Facebook)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Upstream("timeout".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Store("connection refused".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
