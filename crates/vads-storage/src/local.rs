//! Filesystem-backed storage for development and the CLI.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::fetch::{fetch_bytes, http_client, DEFAULT_FETCH_TIMEOUT};
use crate::keys::validate_key;
use crate::storage::ObjectStorage;

pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "./storage";

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    /// Served base URL; `file://` URLs are returned when unset
    base_url: Option<String>,
    http: reqwest::Client,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> StorageResult<Self> {
        Ok(Self {
            root: root.into(),
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
            http: http_client(DEFAULT_FETCH_TIMEOUT)?,
        })
    }

    /// Create from `LOCAL_STORAGE_DIR` and `LOCAL_STORAGE_BASE_URL`.
    pub fn from_env() -> StorageResult<Self> {
        let root = std::env::var("LOCAL_STORAGE_DIR")
            .unwrap_or_else(|_| DEFAULT_LOCAL_STORAGE_DIR.to_string());
        let base_url = std::env::var("LOCAL_STORAGE_BASE_URL").ok().filter(|s| !s.is_empty());
        Self::new(root, base_url)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an object with `key` is stored at.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str, path: &Path) -> StorageResult<String> {
        if let Some(base) = &self.base_url {
            return Ok(format!("{base}/{key}"));
        }
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        url::Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| StorageError::InvalidKey(key.to_string()))
    }

    /// Write `data` next to the destination and rename it into place.
    async fn write_atomic(&self, key: &str, data: &[u8]) -> StorageResult<PathBuf> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("partial");
        fs::write(&partial, data).await?;
        if let Err(e) = fs::rename(&partial, &dest).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(dest)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload_file(&self, path: &Path, _content_type: &str, key: &str) -> StorageResult<String> {
        let data = fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(path.display().to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let dest = self.write_atomic(key, &data).await?;
        info!(src = %path.display(), dest = %dest.display(), "Stored file");
        self.url_for(key, &dest)
    }

    async fn upload_bytes(&self, data: Vec<u8>, _content_type: &str, key: &str) -> StorageResult<String> {
        let dest = self.write_atomic(key, &data).await?;
        debug!(dest = %dest.display(), bytes = data.len(), "Stored bytes");
        self.url_for(key, &dest)
    }

    async fn upload_from_url(&self, url: &str, key: &str) -> StorageResult<String> {
        let fetched = fetch_bytes(&self.http, url).await?;
        self.upload_bytes(fetched.bytes, "", key).await
    }
}
