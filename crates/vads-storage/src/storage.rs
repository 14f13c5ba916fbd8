//! The object storage seam.

use async_trait::async_trait;
use std::path::Path;

use crate::error::StorageResult;

/// Durable storage for rendered media. Every upload returns the public URL
/// of the stored object.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Upload a file from disk.
    async fn upload_file(&self, path: &Path, content_type: &str, key: &str) -> StorageResult<String>;

    /// Upload an in-memory buffer.
    async fn upload_bytes(&self, data: Vec<u8>, content_type: &str, key: &str) -> StorageResult<String>;

    /// Fetch `url` and store its body under `key`.
    async fn upload_from_url(&self, url: &str, key: &str) -> StorageResult<String>;
}
