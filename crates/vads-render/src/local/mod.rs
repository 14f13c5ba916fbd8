//! Local FFmpeg compiler.

pub mod engine;
pub mod fetch;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use vads_models::{EncodingConfig, VideoCompilationOptions};

use crate::backend::{RenderBackend, RenderOutput};
use crate::error::{RenderError, RenderResult, RenderStep};

pub use engine::{FfmpegEngine, LocalSources};

/// Configuration for local rendering.
#[derive(Debug, Clone)]
pub struct LocalRenderConfig {
    /// Clips materialized (and sources fetched) at once
    pub max_parallel_clips: usize,
    /// Per ffmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    /// Per source download
    pub fetch_timeout: Duration,
    /// Parent of job workspaces; system temp dir when unset
    pub work_dir: Option<PathBuf>,
    /// Encoding of per-clip segments
    pub intermediate: EncodingConfig,
    /// Encoding of the delivered file
    pub output: EncodingConfig,
}

impl Default for LocalRenderConfig {
    fn default() -> Self {
        Self {
            max_parallel_clips: 4,
            ffmpeg_timeout_secs: 1800,
            fetch_timeout: Duration::from_secs(300),
            work_dir: None,
            intermediate: EncodingConfig::for_intermediate(),
            output: EncodingConfig::default(),
        }
    }
}

impl LocalRenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_parallel_clips: env_parse("RENDER_MAX_PARALLEL_CLIPS", defaults.max_parallel_clips),
            ffmpeg_timeout_secs: env_parse("FFMPEG_TIMEOUT_SECS", defaults.ffmpeg_timeout_secs),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 300)),
            work_dir: std::env::var("RENDER_WORK_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            intermediate: defaults.intermediate,
            output: defaults
                .output
                .with_crf(env_parse("OUTPUT_CRF", vads_models::encoding::DEFAULT_CRF)),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Render backend running FFmpeg on this machine.
///
/// Each call builds a fresh [`FfmpegEngine`]; engines are never shared.
pub struct LocalCompiler {
    config: LocalRenderConfig,
    http: Client,
}

impl LocalCompiler {
    pub fn new(config: LocalRenderConfig) -> RenderResult<Self> {
        let http = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| RenderError::failed(RenderStep::Fetch, e.to_string()))?;
        Ok(Self { config, http })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(LocalRenderConfig::from_env())
    }

    pub fn config(&self) -> &LocalRenderConfig {
        &self.config
    }
}

#[async_trait]
impl RenderBackend for LocalCompiler {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn compile(
        &self,
        options: &VideoCompilationOptions,
        cancel: CancellationToken,
    ) -> RenderResult<RenderOutput> {
        options.validate()?;
        let engine = FfmpegEngine::new(self.config.clone(), self.http.clone(), cancel)?;
        let file = engine.render(options).await?;
        Ok(RenderOutput::File(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LocalRenderConfig::default();
        assert_eq!(config.max_parallel_clips, 4);
        assert_eq!(config.output.crf, 23);
        assert_eq!(config.intermediate.crf, 18);
        assert!(!config.intermediate.faststart);
    }

    #[tokio::test]
    async fn test_rejects_invalid_timeline() {
        let compiler = LocalCompiler::new(LocalRenderConfig::default()).unwrap();
        let options: VideoCompilationOptions =
            serde_json::from_value(serde_json::json!({ "clips": [] })).unwrap();
        let err = compiler
            .compile(&options, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Invalid(_)));
    }
}
