//! Per-clip materialization.
//!
//! Every clip on the timeline becomes a silent H.264 segment with identical
//! frame size, frame rate and pixel format, so the segments can be joined
//! with the concat demuxer without re-encoding.

use std::path::Path;
use tracing::{debug, info};

use vads_models::{EncodingConfig, MotionEffect};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::probe::{probe_video, VideoInfo};

/// Frame geometry every segment is normalised to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FrameSpec {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Number of frames covering `duration` seconds.
    pub fn frames_for(&self, duration: f64) -> u64 {
        (duration * self.fps as f64).round().max(1.0) as u64
    }
}

/// How a video clip was turned into a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipMode {
    StreamCopy,
    Reencoded,
}

/// Filter chain turning a looped still image into a segment.
pub fn image_clip_filter(duration: f64, motion: MotionEffect, fade: bool, frame: &FrameSpec) -> String {
    let mut chain = vec![filters::scale_pad(frame.width, frame.height)];
    match filters::zoompan(
        motion,
        frame.width,
        frame.height,
        frame.fps,
        frame.frames_for(duration),
    ) {
        Some(zoom) => chain.push(zoom),
        None => chain.push(format!("fps={}", frame.fps)),
    }
    if fade {
        chain.push(filters::fade_in_out(duration));
    }
    chain.push("format=yuv420p".to_string());
    chain.join(",")
}

/// Filter chain normalising a video source; `shortfall` seconds of the last
/// frame are appended when the source is shorter than the clip.
pub fn video_clip_filter(duration: f64, shortfall: f64, fade: bool, frame: &FrameSpec) -> String {
    let mut chain = vec![
        filters::scale_pad(frame.width, frame.height),
        format!("fps={}", frame.fps),
    ];
    if shortfall > 0.0 {
        chain.push(filters::tpad_clone(shortfall));
    }
    if fade {
        chain.push(filters::fade_in_out(duration));
    }
    chain.push("format=yuv420p".to_string());
    chain.join(",")
}

/// Render a still image as a `duration`-second segment with optional motion.
#[allow(clippy::too_many_arguments)]
pub async fn materialize_image_clip(
    image: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration: f64,
    motion: MotionEffect,
    fade: bool,
    frame: &FrameSpec,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let image = image.as_ref();
    let output = output.as_ref();

    if !(duration.is_finite() && duration > 0.0) {
        return Err(MediaError::invalid_input(format!("clip duration {duration} must be > 0")));
    }
    if !image.exists() {
        return Err(MediaError::FileNotFound(image.to_path_buf()));
    }

    debug!(
        image = %image.display(),
        duration,
        motion = %motion,
        "Materializing image clip"
    );

    let cmd = FfmpegCommand::new(image, output)
        .loop_image(frame.fps)
        .duration(duration)
        .video_filter(image_clip_filter(duration, motion, fade, frame))
        .output_args(encoding.video_args())
        .output_duration(duration)
        .no_audio();

    runner.run(&cmd).await
}

/// Trim a video source to `duration` seconds, re-encoding only when it does
/// not already match the target geometry.
pub async fn materialize_video_clip(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration: f64,
    fade: bool,
    frame: &FrameSpec,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<ClipMode> {
    let video = video.as_ref();
    let output = output.as_ref();

    if !(duration.is_finite() && duration > 0.0) {
        return Err(MediaError::invalid_input(format!("clip duration {duration} must be > 0")));
    }

    let info = probe_video(video).await?;
    let mode = choose_video_mode(&info, duration, fade, frame);

    let cmd = match mode {
        ClipMode::StreamCopy => FfmpegCommand::new(video, output)
            .duration(duration)
            .output_arg("-map")
            .output_arg("0:v:0")
            .output_arg("-c:v")
            .output_arg("copy")
            .no_audio(),
        ClipMode::Reencoded => {
            let shortfall = (duration - info.duration).max(0.0);
            FfmpegCommand::new(video, output)
                .duration(duration)
                .video_filter(video_clip_filter(duration, shortfall, fade, frame))
                .output_args(encoding.video_args())
                .output_duration(duration)
                .no_audio()
        }
    };

    info!(
        video = %video.display(),
        source_width = info.width,
        source_height = info.height,
        source_duration = info.duration,
        duration,
        mode = ?mode,
        "Materializing video clip"
    );

    runner.run(&cmd).await?;
    Ok(mode)
}

/// Stream copy only when the source already is a conforming segment that is
/// long enough and needs no per-frame effects.
pub fn choose_video_mode(info: &VideoInfo, duration: f64, fade: bool, frame: &FrameSpec) -> ClipMode {
    // Copy trims on packet boundaries; allow a frame of slack
    let long_enough = info.duration + 1.0 / frame.fps as f64 >= duration;
    if !fade && long_enough && info.matches_target(frame.width, frame.height, frame.fps) {
        ClipMode::StreamCopy
    } else {
        ClipMode::Reencoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portrait() -> FrameSpec {
        FrameSpec::new(608, 1080, 30)
    }

    fn info(width: u32, height: u32, duration: f64) -> VideoInfo {
        VideoInfo {
            duration,
            width,
            height,
            fps: 30.0,
            codec: "h264".to_string(),
            pix_fmt: "yuv420p".to_string(),
            has_audio: true,
            size: 0,
        }
    }

    #[test]
    fn test_image_filter_static() {
        let f = image_clip_filter(3.0, MotionEffect::Static, false, &portrait());
        assert!(f.starts_with("scale=608:1080:force_original_aspect_ratio=decrease"));
        assert!(f.contains(",fps=30,"));
        assert!(!f.contains("zoompan"));
        assert!(f.ends_with("format=yuv420p"));
    }

    #[test]
    fn test_image_filter_zoom_and_fade() {
        let f = image_clip_filter(5.0, MotionEffect::ZoomIn, true, &portrait());
        // 5s at 30fps -> 150 frames
        assert!(f.contains("zoompan=z='min(1+0.001000*on,1.15)'"));
        assert!(f.contains("fade=t=out:st=4.500:d=0.500"));
    }

    #[test]
    fn test_video_mode_selection() {
        let frame = portrait();
        assert_eq!(choose_video_mode(&info(608, 1080, 6.0), 5.0, false, &frame), ClipMode::StreamCopy);
        assert_eq!(choose_video_mode(&info(1080, 1920, 6.0), 5.0, false, &frame), ClipMode::Reencoded);
        assert_eq!(choose_video_mode(&info(608, 1080, 6.0), 5.0, true, &frame), ClipMode::Reencoded);
        assert_eq!(choose_video_mode(&info(608, 1080, 3.0), 5.0, false, &frame), ClipMode::Reencoded);
    }

    #[test]
    fn test_video_filter_extends_short_sources() {
        let f = video_clip_filter(5.0, 2.0, false, &portrait());
        assert!(f.contains("tpad=stop_mode=clone:stop_duration=2.000"));
        let f = video_clip_filter(5.0, 0.0, false, &portrait());
        assert!(!f.contains("tpad"));
    }

    #[test]
    fn test_frames_for() {
        assert_eq!(portrait().frames_for(7.5), 225);
        assert_eq!(portrait().frames_for(0.001), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_duration() {
        let err = materialize_image_clip(
            "missing.png",
            "out.mp4",
            0.0,
            MotionEffect::Static,
            false,
            &portrait(),
            &EncodingConfig::for_intermediate(),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
