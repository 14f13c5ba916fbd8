//! Segment concatenation with the concat demuxer.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use vads_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// How the segments were joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    StreamCopy,
    Reencoded,
}

/// Concat demuxer list body. Single quotes in paths are escaped as `'\''`.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'", p.display().to_string().replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate segments in order into `output`.
///
/// Stream copy is tried first since every segment is normalised upstream;
/// if the demuxer rejects the copy the join is re-encoded with `encoding`.
/// Cancellation is never retried.
pub async fn concatenate_segments(
    segments: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<ConcatMode> {
    if segments.is_empty() {
        return Err(MediaError::InvalidVideo(
            "No segments to concatenate".to_string(),
        ));
    }

    let list_path = output.with_extension("concat.txt");
    tokio::fs::write(&list_path, concat_list(segments)).await?;

    let copy = FfmpegCommand::new(&list_path, output)
        .concat_list()
        .codec_copy()
        .no_audio();

    let result = match runner.run(&copy).await {
        Ok(()) => Ok(ConcatMode::StreamCopy),
        Err(MediaError::Cancelled) => Err(MediaError::Cancelled),
        Err(e) => {
            warn!(
                segments = segments.len(),
                error = %e,
                "Stream-copy concat failed, re-encoding"
            );
            let reencode = FfmpegCommand::new(&list_path, output)
                .concat_list()
                .output_args(encoding.video_args())
                .no_audio();
            runner.run(&reencode).await.map(|()| ConcatMode::Reencoded)
        }
    };

    // Cleanup concat list
    let _ = tokio::fs::remove_file(&list_path).await;

    if let Ok(mode) = &result {
        info!(segments = segments.len(), mode = ?mode, "Concatenated segments");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_order_and_quoting() {
        let list = concat_list(&[
            PathBuf::from("/tmp/job/clip_000.mp4"),
            PathBuf::from("/tmp/job/it's.mp4"),
        ]);
        assert_eq!(
            list,
            "file '/tmp/job/clip_000.mp4'\nfile '/tmp/job/it'\\''s.mp4'"
        );
    }

    #[tokio::test]
    async fn test_empty_segments_rejected() {
        let err = concatenate_segments(
            &[],
            Path::new("out.mp4"),
            &EncodingConfig::for_intermediate(),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }
}
