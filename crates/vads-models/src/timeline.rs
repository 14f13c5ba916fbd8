//! Declarative compilation timeline.
//!
//! [`VideoCompilationOptions`] is the only thing a render backend receives.
//! It is built once per compile, validated, and never mutated afterwards.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::format::{AspectRatio, FormatParseError, OutputFormat, Resolution};

/// Default music volume relative to the voiceover.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.3;
/// Voiceover is always mixed at unity gain.
pub const VOICEOVER_VOLUME: f64 = 1.0;
pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 200;

/// Visual source kind of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Image,
    Video,
}

impl ClipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKind::Image => "image",
            ClipKind::Video => "video",
        }
    }
}

/// Camera motion applied to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionEffect {
    #[default]
    Static,
    #[serde(alias = "zoom-in")]
    ZoomIn,
    #[serde(alias = "zoom-out")]
    ZoomOut,
}

impl MotionEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionEffect::Static => "static",
            MotionEffect::ZoomIn => "zoom_in",
            MotionEffect::ZoomOut => "zoom_out",
        }
    }

    /// Alternating Ken Burns motion for the clip at `index`.
    pub fn alternating(index: usize) -> Self {
        if index % 2 == 0 {
            MotionEffect::ZoomIn
        } else {
            MotionEffect::ZoomOut
        }
    }
}

impl fmt::Display for MotionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MotionEffect {
    type Err = TimelineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "static" | "none" => Ok(MotionEffect::Static),
            "zoom_in" => Ok(MotionEffect::ZoomIn),
            "zoom_out" => Ok(MotionEffect::ZoomOut),
            _ => Err(TimelineParseError::Motion(s.to_string())),
        }
    }
}

/// Transition into and out of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    None,
    #[default]
    Fade,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::None => "none",
            Transition::Fade => "fade",
        }
    }
}

impl FromStr for Transition {
    type Err = TimelineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Transition::None),
            "fade" => Ok(Transition::Fade),
            _ => Err(TimelineParseError::Transition(s.to_string())),
        }
    }
}

/// One visual segment of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoClip {
    #[serde(rename = "type")]
    pub kind: ClipKind,
    /// Source URL (http(s), file:// or a local path)
    pub url: String,
    /// Seconds, strictly positive
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionEffect>,
}

impl VideoClip {
    pub fn image(url: impl Into<String>, duration: f64) -> Self {
        Self {
            kind: ClipKind::Image,
            url: url.into(),
            duration,
            transition: None,
            motion: None,
        }
    }

    pub fn video(url: impl Into<String>, duration: f64) -> Self {
        Self {
            kind: ClipKind::Video,
            url: url.into(),
            duration,
            transition: None,
            motion: None,
        }
    }

    pub fn with_motion(mut self, motion: MotionEffect) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn motion_or_static(&self) -> MotionEffect {
        self.motion.unwrap_or_default()
    }

    pub fn has_fade(&self) -> bool {
        self.transition == Some(Transition::Fade)
    }
}

/// A time-coded text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    pub text: String,
    /// Seconds from timeline start, >= 0
    pub start: f64,
    /// Seconds, > 0
    pub duration: f64,
}

impl Caption {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Clamp the cue so it ends no later than `total`.
    ///
    /// Returns `None` when nothing of the cue remains visible.
    pub fn clamped_to(&self, total: f64) -> Option<Caption> {
        if self.start >= total {
            return None;
        }
        let duration = self.duration.min(total - self.start);
        (duration > 0.0).then(|| Caption {
            text: self.text.clone(),
            start: self.start,
            duration,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

impl CaptionPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPosition::Top => "top",
            CaptionPosition::Center => "center",
            CaptionPosition::Bottom => "bottom",
        }
    }
}

impl FromStr for CaptionPosition {
    type Err = TimelineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(CaptionPosition::Top),
            "center" | "middle" => Ok(CaptionPosition::Center),
            "bottom" => Ok(CaptionPosition::Bottom),
            _ => Err(TimelineParseError::Position(s.to_string())),
        }
    }
}

/// Visual style applied to every caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// `#RRGGBB` or `#RRGGBBAA`
    #[serde(default = "default_color")]
    pub color: String,
    /// Box behind the text; `None` draws an outline only
    #[serde(default = "default_background", skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default)]
    pub position: CaptionPosition,
}

fn default_font() -> String {
    "Arial".to_string()
}
fn default_font_size() -> u32 {
    48
}
fn default_color() -> String {
    "#FFFFFF".to_string()
}
fn default_background() -> Option<String> {
    Some("#000000AA".to_string())
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: default_font_size(),
            color: default_color(),
            background: default_background(),
            position: CaptionPosition::default(),
        }
    }
}

/// An RGBA colour parsed from a `#RRGGBB[AA]` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 255 is fully opaque
    pub a: u8,
}

impl Rgba {
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgba {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: if hex.len() == 8 { byte(6)? } else { 255 },
        })
    }

    /// `#RRGGBB` without the alpha channel.
    pub fn to_hex_rgb(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Everything a render backend needs to produce the final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoCompilationOptions {
    /// Visual clips in playback order
    pub clips: Vec<VideoClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_url: Option<String>,
    /// Voiceover length in seconds, when known ahead of rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default = "default_music_volume")]
    pub music_volume: f64,
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default)]
    pub caption_style: CaptionStyle,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_music_volume() -> f64 {
    DEFAULT_MUSIC_VOLUME
}

impl VideoCompilationOptions {
    /// Output frame size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.resolution.dimensions(self.aspect_ratio)
    }

    /// Sum of clip durations.
    pub fn clips_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Total timeline length: the clips, or the voiceover if it runs longer.
    pub fn total_duration(&self) -> f64 {
        let clips = self.clips_duration();
        match self.voiceover_duration {
            Some(vo) if self.voiceover_url.is_some() && vo.is_finite() && vo > clips => vo,
            _ => clips,
        }
    }

    /// Start offset of each clip (prefix sums of durations).
    pub fn clip_starts(&self) -> Vec<f64> {
        self.clips
            .iter()
            .scan(0.0, |acc, clip| {
                let start = *acc;
                *acc += clip.duration;
                Some(start)
            })
            .collect()
    }

    pub fn has_audio(&self) -> bool {
        self.voiceover_url.is_some() || self.music_url.is_some()
    }

    /// Check every invariant a backend relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.clips.is_empty() {
            return Err(ValidationError::NoClips);
        }

        for (index, clip) in self.clips.iter().enumerate() {
            if !(clip.duration.is_finite() && clip.duration > 0.0) {
                return Err(ValidationError::ClipDuration {
                    index,
                    duration: clip.duration,
                });
            }
            validate_source("clip", &clip.url)?;
        }

        if let Some(url) = &self.voiceover_url {
            validate_source("voiceover", url)?;
        }
        if let Some(d) = self.voiceover_duration {
            if !(d.is_finite() && d > 0.0) {
                return Err(ValidationError::VoiceoverDuration(d));
            }
        }
        if let Some(url) = &self.music_url {
            validate_source("music", url)?;
        }
        if !(0.0..=1.0).contains(&self.music_volume) {
            return Err(ValidationError::MusicVolume(self.music_volume));
        }

        let total = self.total_duration();
        for (index, cue) in self.captions.iter().enumerate() {
            if cue.text.trim().is_empty() {
                return Err(ValidationError::Caption {
                    index,
                    reason: "empty text".to_string(),
                });
            }
            if !(cue.start.is_finite() && cue.start >= 0.0) {
                return Err(ValidationError::Caption {
                    index,
                    reason: format!("start {} must be >= 0", cue.start),
                });
            }
            if !(cue.duration.is_finite() && cue.duration > 0.0) {
                return Err(ValidationError::Caption {
                    index,
                    reason: format!("duration {} must be > 0", cue.duration),
                });
            }
            // Small tolerance for float accumulation in prefix sums
            if cue.end() > total + 1e-6 {
                return Err(ValidationError::Caption {
                    index,
                    reason: format!("ends at {:.3}s past timeline end {:.3}s", cue.end(), total),
                });
            }
        }

        let style = &self.caption_style;
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&style.font_size) {
            return Err(ValidationError::FontSize(style.font_size));
        }
        if style.font.trim().is_empty() {
            return Err(ValidationError::Font);
        }
        if Rgba::parse(&style.color).is_none() {
            return Err(ValidationError::Color(style.color.clone()));
        }
        if let Some(bg) = &style.background {
            if Rgba::parse(bg).is_none() {
                return Err(ValidationError::Color(bg.clone()));
            }
        }

        Ok(())
    }
}

fn validate_source(field: &'static str, source: &str) -> Result<(), ValidationError> {
    if source.trim().is_empty() {
        return Err(ValidationError::Source {
            field,
            source_url: source.to_string(),
        });
    }
    if source.contains("://") && url::Url::parse(source).is_err() {
        return Err(ValidationError::Source {
            field,
            source_url: source.to_string(),
        });
    }
    Ok(())
}

/// Reasons a timeline is rejected before rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("timeline has no clips")]
    NoClips,

    #[error("clip {index} has invalid duration {duration}")]
    ClipDuration { index: usize, duration: f64 },

    #[error("invalid {field} source: {source_url:?}")]
    Source {
        field: &'static str,
        source_url: String,
    },

    #[error("voiceover duration {0} must be > 0")]
    VoiceoverDuration(f64),

    #[error("music volume {0} must be within 0..=1")]
    MusicVolume(f64),

    #[error("caption {index}: {reason}")]
    Caption { index: usize, reason: String },

    #[error("font size {0} must be within {MIN_FONT_SIZE}..={MAX_FONT_SIZE}")]
    FontSize(u32),

    #[error("caption font must not be empty")]
    Font,

    #[error("invalid colour {0:?}, expected #RRGGBB or #RRGGBBAA")]
    Color(String),
}

#[derive(Debug, Error)]
pub enum TimelineParseError {
    #[error("Unknown motion effect: {0}")]
    Motion(String),
    #[error("Unknown transition: {0}")]
    Transition(String),
    #[error("Unknown caption position: {0}")]
    Position(String),
    #[error(transparent)]
    Format(#[from] FormatParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(durations: &[f64]) -> VideoCompilationOptions {
        VideoCompilationOptions {
            clips: durations
                .iter()
                .enumerate()
                .map(|(i, d)| VideoClip::image(format!("https://cdn.example.com/{i}.png"), *d))
                .collect(),
            voiceover_url: None,
            voiceover_duration: None,
            music_url: None,
            music_volume: DEFAULT_MUSIC_VOLUME,
            captions: Vec::new(),
            caption_style: CaptionStyle::default(),
            resolution: Resolution::FullHd1080,
            aspect_ratio: AspectRatio::Portrait,
            output_format: OutputFormat::Mp4,
        }
    }

    #[test]
    fn test_clip_starts_are_prefix_sums() {
        let opts = options(&[5.0, 5.0, 5.0]);
        assert_eq!(opts.clip_starts(), vec![0.0, 5.0, 10.0]);
        assert_eq!(opts.total_duration(), 15.0);
    }

    #[test]
    fn test_total_duration_extends_to_voiceover() {
        let mut opts = options(&[2.0, 2.0]);
        opts.voiceover_url = Some("https://cdn.example.com/vo.mp3".to_string());
        opts.voiceover_duration = Some(8.0);
        assert_eq!(opts.total_duration(), 8.0);

        opts.voiceover_duration = Some(3.0);
        assert_eq!(opts.total_duration(), 4.0);
    }

    #[test]
    fn test_validate_rejects_bad_timelines() {
        assert_eq!(options(&[]).validate(), Err(ValidationError::NoClips));
        assert!(matches!(
            options(&[1.0, 0.0]).validate(),
            Err(ValidationError::ClipDuration { index: 1, .. })
        ));

        let mut opts = options(&[1.0]);
        opts.music_volume = 1.5;
        assert_eq!(opts.validate(), Err(ValidationError::MusicVolume(1.5)));

        let mut opts = options(&[1.0]);
        opts.caption_style.font_size = 4;
        assert_eq!(opts.validate(), Err(ValidationError::FontSize(4)));

        let mut opts = options(&[1.0]);
        opts.caption_style.color = "white".to_string();
        assert!(matches!(opts.validate(), Err(ValidationError::Color(_))));

        let mut opts = options(&[1.0]);
        opts.clips[0].url = "https://exa mple.com/x.png".to_string();
        assert!(matches!(opts.validate(), Err(ValidationError::Source { .. })));
    }

    #[test]
    fn test_validate_allows_overlapping_captions() {
        let mut opts = options(&[5.0]);
        opts.captions = vec![Caption::new("one", 0.0, 3.0), Caption::new("two", 1.0, 3.0)];
        assert_eq!(opts.validate(), Ok(()));

        opts.captions.push(Caption::new("late", 4.0, 2.0));
        assert!(matches!(opts.validate(), Err(ValidationError::Caption { index: 2, .. })));
    }

    #[test]
    fn test_caption_clamp() {
        let cue = Caption::new("hi", 4.0, 3.0);
        assert_eq!(cue.clamped_to(5.0).unwrap().duration, 1.0);
        assert!(cue.clamped_to(4.0).is_none());
        assert_eq!(cue.clamped_to(10.0).unwrap(), cue);
    }

    #[test]
    fn test_motion_parse_and_alias() {
        assert_eq!("zoom-in".parse::<MotionEffect>().unwrap(), MotionEffect::ZoomIn);
        assert_eq!(
            serde_json::from_str::<MotionEffect>("\"zoom-out\"").unwrap(),
            MotionEffect::ZoomOut
        );
        assert_eq!(MotionEffect::alternating(0), MotionEffect::ZoomIn);
        assert_eq!(MotionEffect::alternating(1), MotionEffect::ZoomOut);
    }

    #[test]
    fn test_rgba_parse() {
        assert_eq!(
            Rgba::parse("#FF8000"),
            Some(Rgba { r: 255, g: 128, b: 0, a: 255 })
        );
        assert_eq!(Rgba::parse("#00000080").unwrap().a, 128);
        assert!(Rgba::parse("FF8000").is_none());
        assert!(Rgba::parse("#GG0000").is_none());
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let opts = options(&[2.5, 2.5]);
        let a = serde_json::to_string(&opts).unwrap();
        let b = serde_json::to_string(&opts.clone()).unwrap();
        assert_eq!(a, b);
        let json: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(json["clips"][0]["type"], "image");
        assert_eq!(json["resolution"], "1080p");
        assert_eq!(json["aspect_ratio"], "portrait");
    }
}
