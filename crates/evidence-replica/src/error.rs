//! Error types for replica operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("replica transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("replica API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected replica response: {0}")]
    InvalidResponse(String),
}
