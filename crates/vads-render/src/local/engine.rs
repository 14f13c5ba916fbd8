//! Per-job FFmpeg render engine.
//!
//! An engine owns a temp workspace for one job. Fetched sources, segments,
//! the joined video and the caption file all live there and disappear with
//! the engine; only the final file is moved into its own directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::try_join_all;
use reqwest::Client;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vads_media::fs_utils::move_file;
use vads_media::{
    compose_final, concatenate_segments, generate_thumbnail, materialize_image_clip,
    materialize_video_clip, probe_duration, probe_video, write_srt, ComposeSpec, FfmpegProgress,
    FfmpegRunner, FrameSpec,
};
use vads_models::{Caption, ClipKind, RenderJob, RenderStatus, VideoCompilationOptions};

use super::fetch::fetch_source;
use super::LocalRenderConfig;
use crate::backend::RenderedFile;
use crate::error::{RenderError, RenderResult, RenderStep};

/// Sources of one job as local files.
#[derive(Debug, Clone)]
pub struct LocalSources {
    /// One per clip, in timeline order
    pub clips: Vec<PathBuf>,
    pub voiceover: Option<PathBuf>,
    pub music: Option<PathBuf>,
}

/// Render engine for a single job.
pub struct FfmpegEngine {
    workspace: TempDir,
    config: LocalRenderConfig,
    http: Client,
    runner: FfmpegRunner,
    cancel: CancellationToken,
    job: RenderJob,
}

impl FfmpegEngine {
    pub fn new(config: LocalRenderConfig, http: Client, cancel: CancellationToken) -> RenderResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vads-job-");
        let workspace = match &config.work_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(|e| RenderError::failed(RenderStep::Fetch, format!("failed to create workspace: {e}")))?;

        let runner = FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(config.ffmpeg_timeout_secs);
        let job = RenderJob::new(uuid::Uuid::new_v4().to_string(), "local");

        Ok(Self {
            workspace,
            config,
            http,
            runner,
            cancel,
            job,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn job(&self) -> &RenderJob {
        &self.job
    }

    /// Run every step for a validated timeline.
    pub async fn render(mut self, options: &VideoCompilationOptions) -> RenderResult<RenderedFile> {
        let started = Instant::now();
        info!(
            job_id = %self.job.id,
            workspace = %self.workspace().display(),
            clips = options.clips.len(),
            captions = options.captions.len(),
            "Starting local render"
        );

        let result = self.run_steps(options).await;
        match &result {
            Ok(file) => {
                self.set_status(RenderStatus::Done);
                info!(
                    job_id = %self.job.id,
                    duration = file.duration,
                    width = file.width,
                    height = file.height,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Local render complete"
                );
            }
            Err(e) => {
                if let Err(t) = self.job.fail(e.to_string()) {
                    debug!(error = %t, "Render job already terminal");
                }
                warn!(job_id = %self.job.id, error = %e, "Local render failed");
            }
        }
        result
    }

    async fn run_steps(&mut self, options: &VideoCompilationOptions) -> RenderResult<RenderedFile> {
        self.set_status(RenderStatus::Fetching);
        let sources = self.fetch_sources(options).await?;

        self.set_status(RenderStatus::Rendering);
        let segments = self.materialize(options, &sources).await?;
        let joined = self.concat(&segments).await?;

        let voiceover_duration = self.voiceover_duration(options, &sources).await;
        let clips_duration = options.clips_duration();
        let total = voiceover_duration
            .filter(|vo| *vo > clips_duration)
            .unwrap_or(clips_duration);

        let subtitles = self.write_captions(&options.captions, total).await?;
        let encoded = self
            .encode(options, &sources, joined, clips_duration, total, subtitles)
            .await?;

        self.set_status(RenderStatus::Saving);
        self.save(options, &encoded, total).await
    }

    fn set_status(&mut self, status: RenderStatus) {
        match self.job.advance(status) {
            Ok(()) => debug!(job_id = %self.job.id, status = %status, "Render status"),
            Err(e) => warn!(job_id = %self.job.id, error = %e, "Unexpected render status change"),
        }
    }

    fn check_cancelled(&self) -> RenderResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(())
    }

    /// Download every distinct source once, bounded by `max_parallel_clips`.
    pub async fn fetch_sources(&self, options: &VideoCompilationOptions) -> RenderResult<LocalSources> {
        self.check_cancelled()?;

        let mut wanted: Vec<(&str, &'static str)> = Vec::new();
        for clip in &options.clips {
            let ext = match clip.kind {
                ClipKind::Image => "png",
                ClipKind::Video => "mp4",
            };
            wanted.push((clip.url.as_str(), ext));
        }
        if let Some(url) = &options.voiceover_url {
            wanted.push((url.as_str(), "mp3"));
        }
        if let Some(url) = &options.music_url {
            wanted.push((url.as_str(), "mp3"));
        }

        let mut distinct: Vec<(&str, &'static str)> = Vec::new();
        for (url, ext) in wanted {
            if !distinct.iter().any(|(u, _)| *u == url) {
                distinct.push((url, ext));
            }
        }

        let semaphore = Semaphore::new(self.config.max_parallel_clips.max(1));
        let semaphore = &semaphore;
        let dir = self.workspace();
        let fetches = distinct.iter().enumerate().map(|(i, (url, ext))| async move {
            let _permit = semaphore.acquire().await.map_err(|_| RenderError::Cancelled)?;
            let path = fetch_source(&self.http, url, dir, &format!("src_{i:03}"), ext).await?;
            Ok::<_, RenderError>((url.to_string(), path))
        });

        let fetched: HashMap<String, PathBuf> = tokio::select! {
            _ = self.cancel.cancelled() => return Err(RenderError::Cancelled),
            fetched = try_join_all(fetches) => fetched?.into_iter().collect(),
        };
        info!(sources = fetched.len(), "Fetched sources");

        let lookup = |url: &str| {
            fetched
                .get(url)
                .cloned()
                .ok_or_else(|| RenderError::failed(RenderStep::Fetch, format!("source missing: {url}")))
        };

        Ok(LocalSources {
            clips: options
                .clips
                .iter()
                .map(|c| lookup(&c.url))
                .collect::<RenderResult<_>>()?,
            voiceover: options.voiceover_url.as_deref().map(lookup).transpose()?,
            music: options.music_url.as_deref().map(lookup).transpose()?,
        })
    }

    fn frame(&self, options: &VideoCompilationOptions) -> FrameSpec {
        let (width, height) = options.dimensions();
        FrameSpec::new(width, height, self.config.intermediate.fps)
    }

    /// Turn every clip into a conforming segment, in parallel.
    pub async fn materialize(
        &self,
        options: &VideoCompilationOptions,
        sources: &LocalSources,
    ) -> RenderResult<Vec<PathBuf>> {
        self.check_cancelled()?;

        let frame = self.frame(options);
        let semaphore = Semaphore::new(self.config.max_parallel_clips.max(1));
        let semaphore = &semaphore;
        let frame = &frame;

        let tasks = options
            .clips
            .iter()
            .zip(&sources.clips)
            .enumerate()
            .map(|(i, (clip, source))| async move {
                let _permit = semaphore.acquire().await.map_err(|_| RenderError::Cancelled)?;
                let output = self.workspace().join(format!("clip_{i:03}.mp4"));
                let encoding = &self.config.intermediate;

                match clip.kind {
                    ClipKind::Image => materialize_image_clip(
                        source,
                        &output,
                        clip.duration,
                        clip.motion_or_static(),
                        clip.has_fade(),
                        frame,
                        encoding,
                        &self.runner,
                    )
                    .await
                    .map_err(|e| RenderError::from_media(RenderStep::Materialize, e))?,
                    ClipKind::Video => {
                        let mode = materialize_video_clip(
                            source,
                            &output,
                            clip.duration,
                            clip.has_fade(),
                            frame,
                            encoding,
                            &self.runner,
                        )
                        .await
                        .map_err(|e| RenderError::from_media(RenderStep::Materialize, e))?;
                        debug!(clip = i, mode = ?mode, "Video clip materialized");
                    }
                }
                Ok::<_, RenderError>(output)
            });

        // First failure drops the rest, which kills their ffmpeg processes
        let segments = try_join_all(tasks).await?;
        info!(segments = segments.len(), "Materialized clips");
        Ok(segments)
    }

    pub async fn concat(&self, segments: &[PathBuf]) -> RenderResult<PathBuf> {
        self.check_cancelled()?;
        let joined = self.workspace().join("joined.mp4");
        concatenate_segments(segments, &joined, &self.config.intermediate, &self.runner)
            .await
            .map_err(|e| RenderError::from_media(RenderStep::Concat, e))?;
        Ok(joined)
    }

    /// Voiceover length from the hint, else probed from the file.
    async fn voiceover_duration(
        &self,
        options: &VideoCompilationOptions,
        sources: &LocalSources,
    ) -> Option<f64> {
        let path = sources.voiceover.as_ref()?;
        if let Some(hint) = options.voiceover_duration.filter(|d| d.is_finite() && *d > 0.0) {
            return Some(hint);
        }
        match probe_duration(path).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                warn!(error = %e, "Could not probe voiceover duration, using clip length");
                None
            }
        }
    }

    /// Write the SRT for `cues` clamped to `total`; `None` without cues.
    pub async fn write_captions(&self, cues: &[Caption], total: f64) -> RenderResult<Option<PathBuf>> {
        let cues: Vec<Caption> = cues.iter().filter_map(|c| c.clamped_to(total)).collect();
        if cues.is_empty() {
            return Ok(None);
        }
        let path = self.workspace().join("captions.srt");
        write_srt(&cues, &path)
            .await
            .map_err(|e| RenderError::from_media(RenderStep::Captions, e))?;
        debug!(cues = cues.len(), path = %path.display(), "Wrote captions");
        Ok(Some(path))
    }

    async fn encode(
        &self,
        options: &VideoCompilationOptions,
        sources: &LocalSources,
        joined: PathBuf,
        video_duration: f64,
        total: f64,
        subtitles: Option<PathBuf>,
    ) -> RenderResult<PathBuf> {
        self.check_cancelled()?;

        let (_, height) = options.dimensions();
        let spec = ComposeSpec {
            video: joined,
            video_duration,
            total_duration: total,
            voiceover: sources.voiceover.clone(),
            music: sources.music.clone(),
            music_volume: options.music_volume,
            subtitles: subtitles.map(|srt| (srt, options.caption_style.clone())),
            frame_height: height,
        };

        let output = self
            .workspace()
            .join(format!("final.{}", options.output_format.extension()));
        let job_id = self.job.id.clone();
        compose_final(&spec, &output, &self.config.output, &self.runner, move |p: FfmpegProgress| {
            debug!(job_id = %job_id, percent = p.percentage(total), speed = p.speed, "Encoding");
        })
        .await
        .map_err(|e| RenderError::from_media(RenderStep::Encode, e))?;
        Ok(output)
    }

    /// Move the encoded file into its own directory and add a thumbnail.
    async fn save(
        &self,
        options: &VideoCompilationOptions,
        encoded: &Path,
        total: f64,
    ) -> RenderResult<RenderedFile> {
        let save_err = |e: String| RenderError::failed(RenderStep::Save, e);

        let mut builder = tempfile::Builder::new();
        builder.prefix("vads-out-");
        let dir = match &self.config.work_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| save_err(e.to_string()))?;

        let path = dir
            .path()
            .join(format!("compiled.{}", options.output_format.extension()));
        move_file(encoded, &path)
            .await
            .map_err(|e| save_err(e.to_string()))?;

        let (mut width, mut height) = options.dimensions();
        let mut duration = total;
        match probe_video(&path).await {
            Ok(info) => {
                width = info.width;
                height = info.height;
                duration = info.duration;
            }
            Err(e) => warn!(error = %e, "Could not probe rendered video"),
        }

        let mut file = RenderedFile::new(dir, path, duration, width, height, options.output_format);

        let thumbnail = file.dir().join("thumbnail.jpg");
        match generate_thumbnail(file.path(), &thumbnail, duration, &self.runner).await {
            Ok(()) => file = file.with_thumbnail(thumbnail),
            Err(e) => warn!(error = %e, "Thumbnail generation failed"),
        }

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vads_models::VideoClip;

    fn engine() -> FfmpegEngine {
        FfmpegEngine::new(LocalRenderConfig::default(), Client::new(), CancellationToken::new()).unwrap()
    }

    #[tokio::test]
    async fn test_workspace_removed_with_engine() {
        let engine = engine();
        let workspace = engine.workspace().to_path_buf();
        assert!(workspace.exists());
        assert_eq!(engine.job().status, RenderStatus::Queued);
        drop(engine);
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_captions_clamped_to_total() {
        let engine = engine();
        let cues = vec![
            Caption::new("first", 0.0, 2.0),
            Caption::new("tail", 5.0, 4.0),
            Caption::new("past the end", 7.0, 1.0),
        ];
        let path = engine.write_captions(&cues, 6.0).await.unwrap().unwrap();
        let srt = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(srt.contains("00:00:05,000 --> 00:00:06,000"));
        assert!(!srt.contains("past the end"));

        assert!(engine.write_captions(&[], 6.0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_dedups_local_sources() {
        let engine = engine();
        let image = engine.workspace().join("shared.png");
        tokio::fs::write(&image, b"x").await.unwrap();
        let url = image.to_string_lossy().to_string();

        let mut options: VideoCompilationOptions = serde_json::from_value(serde_json::json!({
            "clips": [{"type": "image", "url": url, "duration": 2.0}]
        }))
        .unwrap();
        options.clips.push(VideoClip::image(url.clone(), 3.0));

        let sources = engine.fetch_sources(&options).await.unwrap();
        assert_eq!(sources.clips, vec![image.clone(), image]);
        assert!(sources.voiceover.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_engine_stops_before_work() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = FfmpegEngine::new(LocalRenderConfig::default(), Client::new(), cancel).unwrap();
        let options: VideoCompilationOptions = serde_json::from_value(serde_json::json!({
            "clips": [{"type": "image", "url": "/nonexistent.png", "duration": 2.0}]
        }))
        .unwrap();
        let err = engine.render(&options).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
