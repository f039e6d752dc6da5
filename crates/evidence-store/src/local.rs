//! Local-disk object store.
//!
//! Keys map to paths under a root directory. Writes go through a temp file
//! and an atomic rename so readers never observe a partial object, and the
//! file is fsynced before the rename. Presigned URLs degrade to plain
//! `file://` URLs.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::{ObjectReader, StoreError};

/// Filesystem-backed object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolves a key to a path, rejecting traversal outside the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StoreError::InvalidKey(format!(
                        "key must be a plain relative path: {}",
                        key
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    pub(crate) async fn put(
        &self,
        key: &str,
        mut reader: ObjectReader,
        content_length: u64,
    ) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, fsync, then rename into place.
        let tmp = path.with_extension(format!("tmp{:016x}", rand::random::<u64>()));
        let mut file = fs::File::create(&tmp).await?;
        let written = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        };
        if written != content_length {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Backend(format!(
                "short write for {}: expected {} bytes, wrote {}",
                key, content_length, written
            )));
        }
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        debug!(key, bytes = written, "stored object");
        Ok(())
    }

    pub(crate) async fn get(&self, key: &str) -> Result<ObjectReader, StoreError> {
        let path = self.resolve(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn head(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn presign(&self, key: &str) -> Result<String, StoreError> {
        let path = self.resolve(key)?;
        Ok(format!("file://{}", path.display()))
    }
}
