//! `vads-compile`: compile a project manifest into a video.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vads_media::{animate_image, check_ffmpeg, FfmpegRunner};
use vads_models::{AspectRatio, CompileRequest, MotionEffect, OutputFormat, Resolution};
use vads_pipeline::{
    BackendKind, CompileService, MemoryProjectStore, PipelineConfig, ProjectManifest, StorageKind,
};

#[derive(Debug, Parser)]
#[command(name = "vads-compile", version, about = "Compile ad projects into finished videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile every scene of a project manifest into one video
    Compile {
        /// Project manifest (project, scenes and assets as JSON)
        #[arg(long)]
        manifest: PathBuf,

        #[arg(long, env = "RENDER_BACKEND")]
        backend: Option<BackendKind>,

        #[arg(long, env = "STORAGE_BACKEND")]
        storage: Option<StorageKind>,

        /// Compile request as JSON; flags below override its fields
        #[arg(long)]
        request: Option<PathBuf>,

        #[arg(long)]
        resolution: Option<Resolution>,

        #[arg(long)]
        aspect_ratio: Option<AspectRatio>,

        #[arg(long)]
        format: Option<OutputFormat>,

        #[arg(long)]
        music_volume: Option<f64>,

        #[arg(long)]
        target_duration: Option<f64>,

        #[arg(long)]
        motion: Option<MotionEffect>,

        #[arg(long)]
        no_captions: bool,

        /// Write the updated project (new asset, workflow step) back to the manifest
        #[arg(long)]
        save: bool,
    },

    /// Render a single image with a motion effect
    Animate {
        #[arg(long)]
        image: PathBuf,

        #[arg(long, default_value_t = 5.0)]
        duration: f64,

        #[arg(long, default_value = "zoom-in")]
        motion: MotionEffect,

        #[arg(long, default_value = "1080p")]
        resolution: Resolution,

        #[arg(long, default_value = "portrait")]
        aspect_ratio: AspectRatio,

        #[arg(long, default_value = "animated.mp4")]
        output: PathBuf,
    },
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vads=debug"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Compile {
            manifest,
            backend,
            storage,
            request,
            resolution,
            aspect_ratio,
            format,
            music_volume,
            target_duration,
            motion,
            no_captions,
            save,
        } => {
            let mut config = PipelineConfig::from_env();
            if let Some(backend) = backend {
                config.backend = backend;
            }
            if let Some(storage) = storage {
                config.storage = storage;
            }

            let mut request: CompileRequest = match request {
                Some(path) => {
                    let body = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_slice(&body).context("parsing compile request")?
                }
                None => CompileRequest::default(),
            };
            request.resolution = resolution.or(request.resolution);
            request.aspect_ratio = aspect_ratio.or(request.aspect_ratio);
            request.output_format = format.or(request.output_format);
            request.music_volume = music_volume.or(request.music_volume);
            request.target_duration = target_duration.or(request.target_duration);
            request.motion = motion.or(request.motion);
            if no_captions {
                request.include_captions = Some(false);
            }

            let project = ProjectManifest::load(&manifest)
                .await
                .with_context(|| format!("loading manifest {}", manifest.display()))?;
            let project_id = project.project.id.clone();
            let store = Arc::new(MemoryProjectStore::from_manifests([project]));

            info!(
                project_id = %project_id,
                backend = %config.backend,
                storage = %config.storage,
                "Compiling project"
            );
            let service = CompileService::from_config(store.clone(), config)?;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let result = match service.compile_project(&project_id, &request, cancel).await {
                Ok(result) => result,
                Err(e) => bail!("{} ({})", e.public_message(), e.kind()),
            };

            if save {
                if let Some(updated) = store.manifest(&project_id).await {
                    updated.save(&manifest).await?;
                }
            }

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Animate {
            image,
            duration,
            motion,
            resolution,
            aspect_ratio,
            output,
        } => {
            check_ffmpeg()?;
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let runner = FfmpegRunner::new().with_cancel(cancel);

            animate_image(&image, duration, motion, resolution, aspect_ratio, &output, &runner).await?;
            info!(output = %output.display(), "Animated image");
            Ok(())
        }
    }
}
