//! Key-value blob storage for batch artifacts.
//!
//! The pipeline treats storage as a plain collaborator: upload bytes to a
//! path, download them back, check existence. [`GcsStore`] speaks the Google
//! Cloud Storage JSON API for production runs; [`LocalStore`] writes under a
//! directory for development and tests. Both implement [`BlobStore`] so the
//! rest of the workspace never knows which one it holds.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod gcs;

pub use gcs::GcsStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("io error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Minimal blob-store surface the pipeline needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path`, replacing any existing object.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read the object at `path` in full.
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Cheap existence probe.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Directory-backed store. Object paths map to relative file paths.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        // Object keys use forward slashes; strip any leading one so join
        // stays inside the root.
        self.root.join(path.trim_start_matches('/'))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| io_err(&full, e))?;
        tracing::debug!(target: "storage.local", path = %full.display(), size = bytes.len(), "object written");
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path);
        tokio::fs::read(&full).await.map_err(|e| io_err(&full, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_store_round_trips_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .upload("json_ext/ana_stories.json", br#"{"require": []}"#)
            .await
            .unwrap();

        assert!(store.exists("json_ext/ana_stories.json").await.unwrap());
        assert!(!store.exists("json_ext/missing.json").await.unwrap());

        let bytes = store.download("json_ext/ana_stories.json").await.unwrap();
        assert_eq!(bytes, br#"{"require": []}"#);
    }

    #[tokio::test]
    async fn upload_creates_nested_prefixes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.upload("debug/run1/ana_page.html", b"<html>").await.unwrap();
        assert!(tmp.path().join("debug/run1/ana_page.html").is_file());
    }

    #[tokio::test]
    async fn download_missing_object_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let err = store.download("nope.bin").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
