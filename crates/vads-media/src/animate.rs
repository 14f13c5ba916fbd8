//! Single-image animation preview.

use std::path::Path;
use tracing::info;

use vads_models::{AspectRatio, EncodingConfig, MotionEffect, Resolution};

use crate::clip::{materialize_image_clip, FrameSpec};
use crate::command::FfmpegRunner;
use crate::error::MediaResult;

/// Render one image as a standalone clip with the given motion, exactly as
/// the compiler would materialize it on a timeline.
pub async fn animate_image(
    image: impl AsRef<Path>,
    duration: f64,
    motion: MotionEffect,
    resolution: Resolution,
    aspect: AspectRatio,
    output: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let (width, height) = resolution.dimensions(aspect);
    let encoding = EncodingConfig::default();
    let frame = FrameSpec::new(width, height, encoding.fps);

    info!(
        image = %image.as_ref().display(),
        duration,
        motion = %motion,
        width,
        height,
        "Animating image"
    );

    materialize_image_clip(image, output, duration, motion, false, &frame, &encoding, runner).await
}
