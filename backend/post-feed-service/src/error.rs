/// Error types for post-feed-service
///
/// Every failure reaching a handler is one of four kinds. Storage details are
/// logged here and never sent to clients.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;
use tracing::{error, warn};

use crate::db::{InvalidCursor, StoreError};
use crate::models::{ErrorBody, ErrorDetail};

/// Result type for post-feed-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Caller sent something unusable; do not retry unchanged
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No identity, or the identity has no user record
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend unavailable or timed out; retryable
    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthenticated",
            AppError::Storage(_) => "storage_unavailable",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Unauthorized(msg) => {
                msg.clone()
            }
            AppError::Storage(_) => "storage temporarily unavailable, retry later".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            AppError::Storage(detail) => error!(error = %detail, "Storage failure"),
            other => warn!(code = other.code(), error = %other, "Request rejected"),
        }

        HttpResponse::build(status).json(ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.public_message(),
            },
            status: status.as_u16(),
        })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AppError::NotFound(format!("{entity} {id}")),
            StoreError::Unavailable(msg) => AppError::Storage(msg),
            // Conflicts only arise from out-of-band inserts
            StoreError::Conflict(msg) => AppError::Storage(msg),
        }
    }
}

impl From<InvalidCursor> for AppError {
    fn from(_: InvalidCursor) -> Self {
        AppError::Validation("cursor is malformed".to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Storage("storage read timed out".to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Storage(format!("write task failed: {err}"))
    }
}
