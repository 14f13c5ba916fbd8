//! The compile entry point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use vads_models::{AssetId, CompileRequest, ProjectId};
use vads_render::{RenderBackend, RenderError};
use vads_storage::ObjectStorage;

use crate::config::PipelineConfig;
use crate::error::{CompileError, PipelineResult};
use crate::logging::CompileLogger;
use crate::metrics;
use crate::persister::{persist, RenderDetails};
use crate::resolver::resolve_compilation_inputs;
use crate::store::ProjectStore;
use crate::timeline::build_timeline_with;

/// Time a timed-out backend gets to wind down after being cancelled.
pub const RENDER_CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Outcome of a successful compile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileResult {
    pub video_asset_id: AssetId,
    pub url: String,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// Wires the store, a render backend and object storage together.
///
/// Backends are picked once at construction; the service itself holds no
/// per-compile state and can run compiles concurrently.
#[derive(Clone)]
pub struct CompileService {
    store: Arc<dyn ProjectStore>,
    backend: Arc<dyn RenderBackend>,
    storage: Arc<dyn ObjectStorage>,
    config: PipelineConfig,
}

impl CompileService {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        backend: Arc<dyn RenderBackend>,
        storage: Arc<dyn ObjectStorage>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            storage,
            config,
        }
    }

    /// Build backend and storage from `config`.
    pub fn from_config(store: Arc<dyn ProjectStore>, config: PipelineConfig) -> PipelineResult<Self> {
        let backend = config.render_backend()?;
        let storage = config.object_storage()?;
        Ok(Self::new(store, backend, storage, config))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Compile a project into a single video and persist it.
    pub async fn compile_project(
        &self,
        project_id: &ProjectId,
        request: &CompileRequest,
        cancel: CancellationToken,
    ) -> PipelineResult<CompileResult> {
        let logger = CompileLogger::new(project_id, self.backend.name());
        let span = logger.create_span();
        let started = Instant::now();
        metrics::record_compile_started(logger.backend());

        let result = self
            .run(project_id, request, cancel, &logger)
            .instrument(span)
            .await;

        match &result {
            Ok(done) => {
                let elapsed = started.elapsed().as_secs_f64();
                logger.log_completion(&done.url, done.duration, elapsed);
                metrics::record_compile_completed(logger.backend(), elapsed, done.duration);
            }
            Err(e) => {
                let detail = match e {
                    CompileError::Render(RenderError::Failed { detail, .. }) => detail.as_deref(),
                    CompileError::Persist { rendered_url, .. } => rendered_url.as_deref(),
                    _ => None,
                };
                logger.log_error(e.kind().as_str(), &e.to_string(), detail);
                metrics::record_compile_failed(logger.backend(), e.kind().as_str());
            }
        }
        result
    }

    async fn run(
        &self,
        project_id: &ProjectId,
        request: &CompileRequest,
        cancel: CancellationToken,
        logger: &CompileLogger,
    ) -> PipelineResult<CompileResult> {
        logger.log_start(&format!("project {project_id}"));

        let inputs = resolve_compilation_inputs(self.store.as_ref(), project_id).await?;
        logger.log_stage(
            "resolve",
            &format!(
                "{} scenes, {} images, {} video clips",
                inputs.scenes.len(),
                inputs.images.len(),
                inputs.video_clips.len()
            ),
        );

        let options = build_timeline_with(&inputs, request, self.config.max_caption_words)?;
        let (width, height) = options.dimensions();
        let expected = RenderDetails {
            duration: options.total_duration(),
            width,
            height,
            format: options.output_format,
        };
        logger.log_stage(
            "timeline",
            &format!(
                "{} clips, {} captions, {:.2}s at {}x{}",
                options.clips.len(),
                options.captions.len(),
                expected.duration,
                width,
                height
            ),
        );
        if options.voiceover_url.is_none() {
            logger.log_warning("no voiceover found; compiling without narration");
        }

        let render_started = Instant::now();
        let render_cancel = cancel.child_token();
        let mut render = self.backend.compile(&options, render_cancel.clone());
        let output = match self.config.render_timeout {
            Some(limit) => tokio::select! {
                output = &mut render => output?,
                _ = tokio::time::sleep(limit) => {
                    // Let the backend stop its job and release files before reporting
                    render_cancel.cancel();
                    if tokio::time::timeout(RENDER_CANCEL_GRACE, render).await.is_err() {
                        logger.log_warning("render backend did not stop within the grace period");
                    }
                    return Err(RenderError::Timeout(limit).into());
                }
            },
            None => render.await?,
        };
        metrics::record_render_duration(logger.backend(), render_started.elapsed().as_secs_f64());
        logger.log_stage("render", "render finished");

        if cancel.is_cancelled() {
            return Err(CompileError::Cancelled);
        }

        let asset = persist(
            self.storage.as_ref(),
            self.store.as_ref(),
            &inputs.project,
            output,
            &expected,
        )
        .await?;

        Ok(CompileResult {
            video_asset_id: asset.id,
            url: asset.url,
            duration: asset.metadata.duration.unwrap_or(expected.duration),
            width: asset.metadata.width.unwrap_or(width),
            height: asset.metadata.height.unwrap_or(height),
        })
    }
}
