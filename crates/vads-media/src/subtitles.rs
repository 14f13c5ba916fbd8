//! SRT subtitle documents.

use std::fmt::Write as _;
use std::path::Path;

use vads_models::Caption;

use crate::error::MediaResult;

/// Format seconds as an SRT timestamp `HH:MM:SS,mmm`.
///
/// Negative or non-finite input clamps to zero.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Build an SRT document: cues numbered from 1 in the given order.
///
/// Overlapping cues are written as-is; players stack them.
pub fn build_srt(cues: &[Caption]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let text = cue
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end()),
            text
        );
    }
    out
}

/// Write an SRT document for `cues` to `path`.
pub async fn write_srt(cues: &[Caption], path: impl AsRef<Path>) -> MediaResult<()> {
    tokio::fs::write(path.as_ref(), build_srt(cues)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(1.234), "00:00:01,234");
        assert_eq!(format_srt_timestamp(3.234), "00:00:03,234");
        assert_eq!(format_srt_timestamp(3723.5), "01:02:03,500");
        assert_eq!(format_srt_timestamp(-1.0), "00:00:00,000");
    }

    #[test]
    fn test_build_srt_cue_boundaries() {
        let srt = build_srt(&[Caption::new("Meet the bottle", 1.234, 2.0)]);
        assert_eq!(srt, "1\n00:00:01,234 --> 00:00:03,234\nMeet the bottle\n\n");
    }

    #[test]
    fn test_build_srt_numbering_and_overlap() {
        let srt = build_srt(&[
            Caption::new("first", 0.0, 2.0),
            Caption::new("second", 1.0, 2.0),
        ]);
        let blocks: Vec<&str> = srt.trim_end().split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("1\n00:00:00,000 --> 00:00:02,000"));
        assert!(blocks[1].starts_with("2\n00:00:01,000 --> 00:00:03,000"));
        assert!(build_srt(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_write_srt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("captions.srt");
        write_srt(&[Caption::new("hi", 0.5, 1.0)], &path).await.unwrap();
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.contains("00:00:00,500 --> 00:00:01,500"));
    }
}
