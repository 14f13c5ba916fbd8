//! Thumbnail generation.

use std::path::Path;

use vads_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_TIMESTAMP_SECS};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters;

/// Seek position for the poster frame; stays inside very short videos.
pub fn thumbnail_timestamp(duration: f64) -> f64 {
    if duration > 0.0 {
        THUMBNAIL_TIMESTAMP_SECS.min(duration / 2.0)
    } else {
        0.0
    }
}

/// Generate a JPEG poster frame from a video file.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    duration: f64,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(thumbnail_timestamp(duration))
        .single_frame()
        .video_filter(filters::thumbnail(THUMBNAIL_SCALE_WIDTH))
        .output_arg("-q:v")
        .output_arg("3");

    runner.run(&cmd).await
}
