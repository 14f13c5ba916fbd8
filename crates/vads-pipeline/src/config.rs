//! Pipeline configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use vads_render::{LocalCompiler, RemoteRenderer, RenderBackend};
use vads_storage::{LocalStorage, ObjectStorage, S3Storage};

use crate::error::{CompileError, PipelineResult};

/// Longest caption chunk, in words.
pub const DEFAULT_MAX_CAPTION_WORDS: usize = 7;

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct KindParseError {
    kind: &'static str,
    value: String,
}

/// Which render backend compiles videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "ffmpeg" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            _ => Err(KindParseError {
                kind: "render backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Where compiled videos are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Local,
    S3,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "fs" => Ok(StorageKind::Local),
            "s3" | "wasabi" => Ok(StorageKind::S3),
            _ => Err(KindParseError {
                kind: "storage backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub backend: BackendKind,
    pub storage: StorageKind,
    /// Upper bound for rendering one project; none when unset
    pub render_timeout: Option<Duration>,
    /// Longest caption chunk, in words
    pub max_caption_words: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            storage: StorageKind::default(),
            render_timeout: None,
            max_caption_words: DEFAULT_MAX_CAPTION_WORDS,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("RENDER_BACKEND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            storage: std::env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            render_timeout: std::env::var("RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_caption_words: std::env::var("CAPTION_MAX_WORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CAPTION_WORDS),
        }
    }

    /// Build the configured render backend from its environment.
    pub fn render_backend(&self) -> PipelineResult<Arc<dyn RenderBackend>> {
        Ok(match self.backend {
            BackendKind::Local => Arc::new(LocalCompiler::from_env()?),
            BackendKind::Remote => Arc::new(RemoteRenderer::from_env()?),
        })
    }

    /// Build the configured object storage from its environment.
    pub fn object_storage(&self) -> PipelineResult<Arc<dyn ObjectStorage>> {
        Ok(match self.storage {
            StorageKind::Local => Arc::new(LocalStorage::from_env().map_err(CompileError::from)?),
            StorageKind::S3 => Arc::new(S3Storage::from_env().map_err(CompileError::from)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert_eq!("ffmpeg".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!("wasabi".parse::<StorageKind>().unwrap(), StorageKind::S3);
        let err = "gpu".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown render backend: gpu");
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.storage, StorageKind::Local);
        assert!(config.render_timeout.is_none());
        assert_eq!(config.max_caption_words, 7);
    }
}
