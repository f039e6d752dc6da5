//! Digest, key-derivation, and MIME primitives for the evidence vault.
//!
//! This crate is the dependency-free core of the service: a streaming
//! SHA-256 engine, the deterministic bucket-key scheme, and the upload
//! MIME allow-list. It knows nothing about HTTP, databases, or object
//! stores.

pub mod digest;
pub mod key;
pub mod mime;

mod error;

pub use digest::{hash_bytes, hash_stream, normalize, Digest, StreamDigest};
pub use error::Error;
pub use key::{bucket_key, sanitize_filename, staging_key};
pub use mime::{guess_from_filename, validate_mime, DEFAULT_ALLOWED_MIME};
