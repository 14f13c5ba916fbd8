//! FFmpeg CLI wrapper for ad compilation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation via `CancellationToken` and per-command timeouts
//! - Clip materialization (still images with motion, trimmed video)
//! - Concat, SRT captions, voiceover/music mixing and the final encode

pub mod animate;
pub mod audio;
pub mod clip;
pub mod command;
pub mod compose;
pub mod concat;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod subtitles;
pub mod thumbnail;

pub use animate::animate_image;
pub use audio::{mixed_audio_duration, AudioPlan};
pub use clip::{materialize_image_clip, materialize_video_clip, ClipMode, FrameSpec};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{compose_final, ComposeSpec};
pub use concat::{concatenate_segments, ConcatMode};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use subtitles::{build_srt, format_srt_timestamp, write_srt};
pub use thumbnail::generate_thumbnail;
