//! Error types for the evidence service.
//!
//! One taxonomy for the whole service: every failure carries a stable
//! `code` string and maps to exactly one HTTP status. IPFS failures during
//! upload completion never reach this type: the ingestion controller
//! swallows and counts them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Service domain error.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed")]
    Authentication(String),

    #[error("not authorized for this operation")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("digest mismatch: declared {declared}, actual {actual}")]
    HashMismatch { declared: String, actual: String },

    #[error("upload session aborted")]
    SessionAborted,

    #[error("upload session expired")]
    SessionExpired,

    #[error("file too large: {size_bytes} bytes exceeds limit of {max_bytes}")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("unsupported MIME type: {0}")]
    UnsupportedMime(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    // Infrastructure errors
    #[error("object store error: {0}")]
    Storage(#[from] evidence_store::StoreError),

    #[error("replica error: {0}")]
    Ipfs(#[from] evidence_replica::ReplicaError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Error code string for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Authentication(_) => "AUTHENTICATION",
            Self::Authorization(_) => "AUTHORIZATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::HashMismatch { .. } => "HASH_MISMATCH",
            Self::SessionAborted => "CONFLICT",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::UnsupportedMime(_) => "UNSUPPORTED_MIME",
            Self::Precondition(_) => "PRECONDITION",
            Self::Storage(_) => "STORAGE",
            Self::Ipfs(_) => "IPFS_ERROR",
            Self::Database(_) | Self::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Precondition(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::HashMismatch { .. } | Self::SessionAborted => StatusCode::CONFLICT,
            Self::SessionExpired => StatusCode::GONE,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMime(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Storage(_) | Self::Ipfs(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured detail object, present only where it helps the caller.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::HashMismatch { declared, actual } => Some(json!({
                "declared": declared,
                "actual": actual,
            })),
            Self::FileTooLarge {
                size_bytes,
                max_bytes,
            } => Some(json!({
                "sizeBytes": size_bytes,
                "maxBytes": max_bytes,
            })),
            _ => None,
        }
    }
}

impl From<evidence_core::Error> for ServiceError {
    fn from(err: evidence_core::Error) -> Self {
        match err {
            evidence_core::Error::InvalidDigest(msg) => {
                Self::Validation(format!("invalid digest: {}", msg))
            }
            evidence_core::Error::UnsupportedMime(mime) => Self::UnsupportedMime(mime),
            evidence_core::Error::Io(e) => Self::Storage(evidence_store::StoreError::Io(e)),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Authentication failures deliberately carry no cause; the internal
        // reason stays in the logs only.
        let message = match &self {
            Self::Authentication(reason) => {
                tracing::debug!(reason = %reason, "authentication failure");
                "authentication failed".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
