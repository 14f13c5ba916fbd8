//! Compile request accepted by the pipeline entry point.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::format::{AspectRatio, OutputFormat, Resolution};
use crate::timeline::{
    CaptionStyle, MotionEffect, Rgba, Transition, DEFAULT_MUSIC_VOLUME, MAX_FONT_SIZE,
    MIN_FONT_SIZE,
};

/// Default total ad length when scenes carry no explicit durations.
pub const DEFAULT_TARGET_DURATION: f64 = 30.0;
/// Longest ad the pipeline will compile.
pub const MAX_TARGET_DURATION: f64 = 600.0;

/// User-facing knobs for one compile. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CompileRequest {
    /// Background music volume, 0-1 (default 0.3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub music_volume: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,

    /// Burn captions derived from scene scripts (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_captions: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_caption_style"))]
    pub caption_style: Option<CaptionStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,

    /// Total length in seconds split across scenes without explicit durations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0, max = 600.0))]
    pub target_duration: Option<f64>,

    /// Pin one motion for every image clip instead of alternating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionEffect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl CompileRequest {
    pub fn music_volume(&self) -> f64 {
        self.music_volume
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_MUSIC_VOLUME)
            .clamp(0.0, 1.0)
    }

    pub fn target_duration(&self) -> f64 {
        self.target_duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(DEFAULT_TARGET_DURATION)
            .min(MAX_TARGET_DURATION)
    }

    pub fn include_captions(&self) -> bool {
        self.include_captions.unwrap_or(true)
    }

    pub fn transition(&self) -> Transition {
        self.transition.unwrap_or_default()
    }
}

fn validate_caption_style(style: &CaptionStyle) -> Result<(), ValidationError> {
    if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&style.font_size) {
        return Err(ValidationError::new("font_size_out_of_range"));
    }
    if Rgba::parse(&style.color).is_none() {
        return Err(ValidationError::new("invalid_color"));
    }
    if let Some(bg) = &style.background {
        if Rgba::parse(bg).is_none() {
            return Err(ValidationError::new("invalid_background"));
        }
    }
    Ok(())
}
