//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, plus its
//! translation into the HTTP error taxonomy: 400 for invalid input, 429 for
//! exhausted rate limits, 500 for everything internal. Raw internal errors
//! never reach the wire.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use trashtalk_core::ports::PortError;
use trashtalk_core::rate_limit::RateLimitError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller sent something outside the accepted input space
    /// (unknown tone, missing user id, unknown counter action).
    #[error("{0}")]
    InvalidInput(String),

    /// The identity has used up its request budget for the current window.
    #[error("{0}")]
    RateLimited(String),

    /// Represents an error that propagated up from one of the core service
    /// ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network
    /// socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<RateLimitError> for ApiError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Exceeded { .. } => ApiError::RateLimited(e.to_string()),
            // The limiter fails closed; its own query failure is ours.
            RateLimitError::CheckFailed(_) => {
                ApiError::Internal("Failed to check usage limits.".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            other => {
                error!("Internal error serving request: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_400() {
        let response = ApiError::InvalidInput("invalid tone".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_exceeded_maps_to_429_with_context() {
        let err: ApiError = RateLimitError::Exceeded {
            current: 10,
            cap: 10,
            window_hours: 24,
        }
        .into();
        match &err {
            ApiError::RateLimited(msg) => {
                assert!(msg.contains("10"));
                assert!(msg.contains("24h"));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn limit_check_failure_maps_to_500_not_allow() {
        let err: ApiError =
            RateLimitError::CheckFailed(PortError::Unexpected("db down".into())).into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response = ApiError::Internal("secret connection string".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
