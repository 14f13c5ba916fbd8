//! Final composition: video + captions + mixed audio in one encode.

use std::path::{Path, PathBuf};
use tracing::info;

use vads_models::{CaptionStyle, EncodingConfig};

use crate::audio::{AudioPlan, AUDIO_OUT_LABEL};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::progress::FfmpegProgress;

/// Label carrying the final video.
pub const VIDEO_OUT_LABEL: &str = "vout";

/// Inputs of the final encode.
#[derive(Debug, Clone)]
pub struct ComposeSpec {
    /// Concatenated, silent video
    pub video: PathBuf,
    /// Length of `video` in seconds
    pub video_duration: f64,
    /// Length of the delivered file in seconds
    pub total_duration: f64,
    pub voiceover: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub music_volume: f64,
    /// SRT file to burn in, with its style
    pub subtitles: Option<(PathBuf, CaptionStyle)>,
    pub frame_height: u32,
}

impl ComposeSpec {
    pub fn audio_plan(&self) -> AudioPlan {
        AudioPlan::new(
            self.voiceover.is_some(),
            self.music.is_some(),
            self.music_volume,
            1,
        )
    }

    /// Video filter chain ending in `[vout]`.
    pub fn video_filter(&self) -> String {
        let mut chain = Vec::new();
        let hold = self.total_duration - self.video_duration;
        if hold > 0.0005 {
            chain.push(filters::tpad_clone(hold));
        }
        if let Some((srt, style)) = &self.subtitles {
            chain.push(filters::subtitles(
                &srt.to_string_lossy(),
                style,
                self.frame_height,
            ));
        }
        chain.push("format=yuv420p".to_string());
        format!("[0:v]{}[{VIDEO_OUT_LABEL}]", chain.join(","))
    }

    /// Full `-filter_complex` graph.
    pub fn filter_graph(&self) -> String {
        let mut graph = self.video_filter();
        if let Some(audio) = self.audio_plan().filter() {
            graph.push(';');
            graph.push_str(&audio);
        }
        graph
    }

    pub fn build_command(&self, output: &Path, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.video, output);
        if let Some(vo) = &self.voiceover {
            cmd = cmd.add_input(vo);
        }
        if let Some(music) = &self.music {
            cmd = cmd.add_input(music);
        }

        let plan = self.audio_plan();
        cmd = cmd
            .filter_complex(self.filter_graph())
            .map(format!("[{VIDEO_OUT_LABEL}]"))
            .output_args(encoding.video_args());

        cmd = match plan {
            AudioPlan::Silent => cmd.no_audio(),
            _ => cmd
                .map(format!("[{AUDIO_OUT_LABEL}]"))
                .output_args(encoding.audio_args()),
        };

        cmd.output_args(encoding.container_args())
            .output_duration(self.total_duration)
    }
}

/// Run the final encode.
pub async fn compose_final<F>(
    spec: &ComposeSpec,
    output: &Path,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
    progress: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    if !(spec.total_duration.is_finite() && spec.total_duration > 0.0) {
        return Err(MediaError::invalid_input("total duration must be > 0"));
    }

    let plan = spec.audio_plan();
    info!(
        output = %output.display(),
        total_duration = spec.total_duration,
        video_duration = spec.video_duration,
        audio_inputs = plan.input_count(),
        captions = spec.subtitles.is_some(),
        "Composing final video"
    );

    let cmd = spec.build_command(output, encoding);
    runner.run_with_progress(&cmd, progress).await
}
