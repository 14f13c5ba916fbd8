//! Timeline → declarative edit.

use vads_media::mixed_audio_duration;
use vads_models::{
    Caption, ClipKind, MotionEffect, VideoClip, VideoCompilationOptions,
};
use vads_models::timeline::VOICEOVER_VOLUME;

use super::types::{
    Asset, ClipTransition, Edit, EditOutput, EditTimeline, OutputSize, Track, TrackClip,
};

const BACKGROUND: &str = "#000000";
const FIT: &str = "contain";

/// Build the edit for a validated timeline.
///
/// Tracks are stacked titles, visuals, voiceover, music. The last visual is
/// held when the voiceover outlasts the clips.
pub fn build_edit(options: &VideoCompilationOptions) -> Edit {
    let total = options.total_duration();
    let mut tracks = Vec::new();

    let titles = title_track(&options.captions, options, total);
    if !titles.clips.is_empty() {
        tracks.push(titles);
    }
    tracks.push(visual_track(options, total));
    tracks.extend(audio_tracks(options, total));

    let (width, height) = options.dimensions();
    Edit {
        timeline: EditTimeline {
            background: BACKGROUND.to_string(),
            tracks,
        },
        output: EditOutput {
            format: options.output_format.extension().to_string(),
            fps: vads_models::encoding::DEFAULT_FPS,
            size: OutputSize { width, height },
        },
    }
}

fn visual_track(options: &VideoCompilationOptions, total: f64) -> Track {
    let starts = options.clip_starts();
    let hold = (total - options.clips_duration()).max(0.0);
    let last = options.clips.len().saturating_sub(1);

    let clips = options
        .clips
        .iter()
        .zip(starts)
        .enumerate()
        .map(|(i, (clip, start))| {
            let length = if i == last { clip.duration + hold } else { clip.duration };
            visual_clip(clip, start, length)
        })
        .collect();
    Track { clips }
}

fn visual_clip(clip: &VideoClip, start: f64, length: f64) -> TrackClip {
    let asset = match clip.kind {
        ClipKind::Image => Asset::Image {
            src: clip.url.clone(),
        },
        ClipKind::Video => Asset::Video {
            src: clip.url.clone(),
            volume: 0.0,
        },
    };
    let transition = clip.has_fade().then(|| ClipTransition {
        fade_in: Some("fade".to_string()),
        fade_out: Some("fade".to_string()),
    });

    TrackClip {
        asset,
        start,
        length,
        fit: Some(FIT.to_string()),
        effect: effect_name(clip.motion_or_static()).map(str::to_string),
        transition,
    }
}

/// Service effect for a motion tag.
pub fn effect_name(motion: MotionEffect) -> Option<&'static str> {
    match motion {
        MotionEffect::Static => None,
        MotionEffect::ZoomIn => Some("zoomIn"),
        MotionEffect::ZoomOut => Some("zoomOut"),
    }
}

fn audio_tracks(options: &VideoCompilationOptions, total: f64) -> Vec<Track> {
    let voice_len = options
        .voiceover_url
        .as_ref()
        .map(|_| options.voiceover_duration.unwrap_or(total).min(total));
    let music_len = options.music_url.as_ref().map(|_| total);
    // Music stops with the voiceover, as in the local mix
    let mix_len = mixed_audio_duration(voice_len, music_len).unwrap_or(total);

    let mut tracks = Vec::new();
    if let Some(src) = &options.voiceover_url {
        tracks.push(audio_track(src, VOICEOVER_VOLUME, mix_len));
    }
    if let Some(src) = &options.music_url {
        tracks.push(audio_track(src, options.music_volume.clamp(0.0, 1.0), mix_len));
    }
    tracks
}

fn audio_track(src: &str, volume: f64, length: f64) -> Track {
    Track {
        clips: vec![TrackClip {
            asset: Asset::Audio {
                src: src.to_string(),
                volume,
            },
            start: 0.0,
            length,
            fit: None,
            effect: None,
            transition: None,
        }],
    }
}

fn title_track(cues: &[Caption], options: &VideoCompilationOptions, total: f64) -> Track {
    let style = &options.caption_style;
    let clips = cues
        .iter()
        .filter_map(|cue| cue.clamped_to(total))
        .map(|cue| TrackClip {
            asset: Asset::Title {
                text: cue.text,
                font: style.font.clone(),
                size: style.font_size,
                color: style.color.clone(),
                background: style.background.clone(),
                position: style.position.as_str().to_string(),
            },
            start: cue.start,
            length: cue.duration,
            fit: None,
            effect: None,
            transition: None,
        })
        .collect();
    Track { clips }
}
