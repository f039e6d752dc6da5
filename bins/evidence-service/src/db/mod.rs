//! Catalog: persistent records for artifacts and upload sessions.

pub mod models;
pub mod pool;
pub mod queries;

pub use models::{ArtifactRow, ScanStatus, SessionStatus, UploadSessionRow};
pub use pool::create_pool;
pub use queries::*;
