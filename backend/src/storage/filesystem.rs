//! Filesystem storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::StorageBackend;
use crate::error::{AppError, Result};

/// Filesystem-based storage backend
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create new filesystem storage
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get full path for a key (using first 2 chars as subdirectory for distribution)
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(AppError::Storage(format!("Invalid storage key: {}", key)));
        }
        let prefix = key.get(..2).unwrap_or(key);
        Ok(self.base_path.join(prefix).join(key))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(key)?;
        let content = fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", key, e)))?;
        Ok(Bytes::from(content))
    }

    async fn adopt_file(&self, key: &str, source: &Path) -> Result<u64> {
        let path = self.key_to_path(key)?;
        Self::ensure_parent(&path).await?;

        // Rename fails across filesystems; fall back to copy + remove.
        if fs::rename(source, &path).await.is_err() {
            fs::copy(source, &path).await.map_err(|e| {
                AppError::Storage(format!("Failed to store upload as {}: {}", key, e))
            })?;
            fs::remove_file(source).await?;
        }

        Ok(fs::metadata(&path).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adopted_payload_lands_under_prefix_dir() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let source = upload_dir.path().join("upload-0");
        std::fs::write(&source, b"jar bytes").unwrap();

        let storage = FilesystemStorage::new(dir.path());
        storage.adopt_file("abcdef", &source).await.unwrap();

        assert!(dir.path().join("ab").join("abcdef").exists());
        assert_eq!(storage.get("abcdef").await.unwrap(), "jar bytes");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        assert!(matches!(
            storage.get("missing").await,
            Err(AppError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        for key in ["../etc", "a/b", "", ".hidden"] {
            assert!(storage.get(key).await.is_err(), "{key:?}");
        }
    }

    #[tokio::test]
    async fn test_adopt_file_moves_payload() {
        let store_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let source = upload_dir.path().join("upload-1");
        std::fs::write(&source, b"0123456789").unwrap();

        let storage = FilesystemStorage::new(store_dir.path());
        let size = storage.adopt_file("key-1", &source).await.unwrap();

        assert_eq!(size, 10);
        assert!(!source.exists());
        assert_eq!(storage.get("key-1").await.unwrap(), "0123456789");
    }
}
