//! Object storage collaborator.
//!
//! The pipeline only needs two calls: fetch the bytes of an uploaded image
//! and store the composited result. Results are written under a fixed
//! prefix, keeping the original basename:
//!
//! ```text
//! uploads/2024/party.jpg  →  processed/party.jpg
//! ```
//!
//! [`FsStore`] treats a local directory as the bucket, which is what the
//! binary uses and what the integration tests exercise.

use crate::types::basename;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },
    #[error("Invalid object key: {key}")]
    InvalidKey { key: String },
    #[error("Storage IO error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn key(&self) -> &str {
        match self {
            StorageError::NotFound { key }
            | StorageError::InvalidKey { key }
            | StorageError::Io { key, .. } => key,
        }
    }
}

/// Download/upload by key.
pub trait ObjectStore: Sync {
    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn upload(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Key a composited image is stored under: `prefix/basename(key)`.
pub fn processed_key(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), basename(key))
}

/// A directory used as a bucket: key `a/b.jpg` is the file `<root>/a/b.jpg`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key inside the root. Keys that would escape it are rejected.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsStore {
    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                key: key.to_string(),
            },
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        })
    }

    fn upload(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, data).map_err(io_err)
    }
}
