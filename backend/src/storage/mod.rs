//! Storage backends for package file payloads.

pub mod filesystem;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieve content by key
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Take ownership of a payload the upload proxy left on disk, storing it
    /// under `key`. The source file is gone afterwards.
    ///
    /// Returns the number of bytes stored.
    async fn adopt_file(&self, key: &str, source: &Path) -> Result<u64>;
}
