//! Error types for core operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unsupported MIME type: {0}")]
    UnsupportedMime(String),

    #[error("I/O error while hashing: {0}")]
    Io(#[from] std::io::Error),
}
