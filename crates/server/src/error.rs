//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. Route handlers return
//! `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::LookupError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Identity provider call failed.
    #[error("Identity provider error: {0}")]
    Identity(#[from] LookupError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid session credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side failures to Sentry; client mistakes are not
        // error-tracker material.
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Identity(err) => match err {
                LookupError::Rejected(_) => StatusCode::UNAUTHORIZED,
                LookupError::Malformed(_) | LookupError::Transport(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal details to clients.
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Identity(err) => match err {
                LookupError::Rejected(_) => "Invalid provider credential".to_owned(),
                LookupError::Malformed(_) | LookupError::Transport(_) => {
                    "Identity provider error".to_owned()
                }
            },
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
