//! Object-store port for the evidence vault.
//!
//! The service persists evidence bytes through this narrow, stream-oriented
//! interface: `put`, `get`, `head`, `delete`, `presign`. Two backends are
//! selected at startup and dispatched through the [`ObjectStore`] sum type:
//! an S3-compatible client (path-style, SigV4, presigned URLs) and a
//! local-disk fallback for development and tests.

pub mod local;
pub mod s3;

mod error;

use std::time::Duration;

use tokio::io::AsyncRead;

pub use error::StoreError;
pub use local::LocalStore;
pub use s3::{S3Config, S3Store};

/// A read-once stream over an object's bytes.
pub type ObjectReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Operation a presigned URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignOperation {
    Get,
    Put,
}

/// Object-store backend, chosen once at startup.
#[derive(Clone)]
pub enum ObjectStore {
    S3(S3Store),
    Local(LocalStore),
}

impl ObjectStore {
    /// Writes an object, durably, from a stream.
    ///
    /// `content_length` must equal the stream's total size; S3 requires it
    /// for a non-chunked upload and the local backend verifies it.
    pub async fn put(
        &self,
        key: &str,
        reader: ObjectReader,
        content_type: &str,
        content_length: u64,
    ) -> Result<(), StoreError> {
        match self {
            Self::S3(store) => store.put(key, reader, content_type, content_length).await,
            Self::Local(store) => store.put(key, reader, content_length).await,
        }
    }

    /// Opens a read-once stream over the object at `key`.
    ///
    /// Returns [`StoreError::NotFound`] when the key does not exist; any
    /// other failure is a backend error.
    pub async fn get(&self, key: &str) -> Result<ObjectReader, StoreError> {
        match self {
            Self::S3(store) => store.get(key).await,
            Self::Local(store) => store.get(key).await,
        }
    }

    /// Existence check without transferring the body.
    pub async fn head(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            Self::S3(store) => store.head(key).await,
            Self::Local(store) => store.head(key).await,
        }
    }

    /// Deletes the object at `key`. Absent keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::S3(store) => store.delete(key).await,
            Self::Local(store) => store.delete(key).await,
        }
    }

    /// Produces a URL granting `op` on `key` for `ttl`.
    ///
    /// The local backend returns a plain `file://` URL with no authenticity
    /// guarantee; callers must not treat it as a capability.
    pub async fn presign(
        &self,
        op: PresignOperation,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        match self {
            Self::S3(store) => store.presign(op, key, ttl).await,
            Self::Local(store) => store.presign(key),
        }
    }
}
