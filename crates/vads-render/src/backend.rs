//! Render backend abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vads_models::{OutputFormat, VideoCompilationOptions};

use crate::error::RenderResult;

/// Something that turns a compilation timeline into a finished video.
///
/// Implementations validate the timeline before doing any work and stop
/// promptly when `cancel` fires.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    async fn compile(
        &self,
        options: &VideoCompilationOptions,
        cancel: CancellationToken,
    ) -> RenderResult<RenderOutput>;
}

/// Where a finished render lives.
#[derive(Debug)]
pub enum RenderOutput {
    /// Already hosted by the rendering service
    Url(String),
    /// A local file that still has to be uploaded
    File(RenderedFile),
}

impl RenderOutput {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            RenderOutput::Url(url) => Some(url),
            RenderOutput::File(_) => None,
        }
    }
}

/// A locally rendered video.
///
/// Owns the directory it lives in; the file and its thumbnail are deleted
/// when this value is dropped.
#[derive(Debug)]
pub struct RenderedFile {
    dir: TempDir,
    path: PathBuf,
    thumbnail: Option<PathBuf>,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl RenderedFile {
    pub fn new(
        dir: TempDir,
        path: PathBuf,
        duration: f64,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> Self {
        Self {
            dir,
            path,
            thumbnail: None,
            duration,
            width,
            height,
            format,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: PathBuf) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn thumbnail(&self) -> Option<&Path> {
        self.thumbnail.as_deref()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_file_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.mp4");
        std::fs::write(&path, b"video").unwrap();
        let root = dir.path().to_path_buf();

        let file = RenderedFile::new(dir, path.clone(), 6.0, 608, 1080, OutputFormat::Mp4);
        assert_eq!(file.content_type(), "video/mp4");
        assert!(file.thumbnail().is_none());
        assert!(file.path().exists());

        drop(file);
        assert!(!path.exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_output_url() {
        assert_eq!(
            RenderOutput::Url("https://cdn/x.mp4".into()).as_url(),
            Some("https://cdn/x.mp4")
        );
    }
}
