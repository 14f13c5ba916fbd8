//! Output format definitions: resolution presets, aspect ratios, containers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output resolution preset. The preset fixes the frame height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    FullHd1080,
    #[serde(rename = "4k", alias = "2160p")]
    Uhd4k,
}

impl Resolution {
    pub const ALL: &'static [Resolution] = &[
        Resolution::Sd480,
        Resolution::Hd720,
        Resolution::FullHd1080,
        Resolution::Uhd4k,
    ];

    /// Frame height in pixels.
    pub const fn height(&self) -> u32 {
        match self {
            Resolution::Sd480 => 480,
            Resolution::Hd720 => 720,
            Resolution::FullHd1080 => 1080,
            Resolution::Uhd4k => 2160,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Sd480 => "480p",
            Resolution::Hd720 => "720p",
            Resolution::FullHd1080 => "1080p",
            Resolution::Uhd4k => "4k",
        }
    }

    /// Pixel dimensions `(width, height)` for this preset at the given aspect.
    ///
    /// Width is `height * aspect` rounded to the nearest even number so the
    /// result is always valid for yuv420p encoding.
    pub fn dimensions(&self, aspect: AspectRatio) -> (u32, u32) {
        let height = self.height();
        let (aw, ah) = aspect.ratio();
        let exact = height as f64 * aw as f64 / ah as f64;
        (round_to_even(exact), height)
    }
}

/// Round to the nearest even integer (minimum 2).
pub fn round_to_even(value: f64) -> u32 {
    let rounded = ((value / 2.0).round() * 2.0) as u32;
    rounded.max(2)
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "480p" | "480" => Ok(Resolution::Sd480),
            "720p" | "720" => Ok(Resolution::Hd720),
            "1080p" | "1080" => Ok(Resolution::FullHd1080),
            "4k" | "2160p" | "2160" => Ok(Resolution::Uhd4k),
            _ => Err(FormatParseError::Resolution(s.to_string())),
        }
    }
}

/// Named aspect ratio of the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16, TikTok/Reels/Shorts
    #[default]
    Portrait,
    /// 16:9
    Landscape,
    /// 1:1
    Square,
}

impl AspectRatio {
    pub const ALL: &'static [AspectRatio] =
        &[AspectRatio::Portrait, AspectRatio::Landscape, AspectRatio::Square];

    /// Width and height terms of the ratio.
    pub const fn ratio(&self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait => (9, 16),
            AspectRatio::Landscape => (16, 9),
            AspectRatio::Square => (1, 1),
        }
    }

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        let (w, h) = self.ratio();
        w as f64 / h as f64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "portrait",
            AspectRatio::Landscape => "landscape",
            AspectRatio::Square => "square",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "portrait" | "9:16" => Ok(AspectRatio::Portrait),
            "landscape" | "16:9" => Ok(AspectRatio::Landscape),
            "square" | "1:1" => Ok(AspectRatio::Square),
            _ => Err(FormatParseError::AspectRatio(s.to_string())),
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mov,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Mov => "video/quicktime",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "mov" => Ok(OutputFormat::Mov),
            _ => Err(FormatParseError::OutputFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatParseError {
    #[error("Unknown resolution: {0}, expected 480p, 720p, 1080p or 4k")]
    Resolution(String),
    #[error("Unknown aspect ratio: {0}, expected portrait, landscape or square")]
    AspectRatio(String),
    #[error("Unknown output format: {0}, expected mp4 or mov")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_table() {
        let expected = [
            (Resolution::Sd480, AspectRatio::Landscape, (854, 480)),
            (Resolution::Hd720, AspectRatio::Landscape, (1280, 720)),
            (Resolution::FullHd1080, AspectRatio::Landscape, (1920, 1080)),
            (Resolution::Uhd4k, AspectRatio::Landscape, (3840, 2160)),
            (Resolution::Sd480, AspectRatio::Portrait, (270, 480)),
            (Resolution::Hd720, AspectRatio::Portrait, (406, 720)),
            (Resolution::FullHd1080, AspectRatio::Portrait, (608, 1080)),
            (Resolution::Uhd4k, AspectRatio::Portrait, (1216, 2160)),
            (Resolution::Sd480, AspectRatio::Square, (480, 480)),
            (Resolution::Hd720, AspectRatio::Square, (720, 720)),
            (Resolution::FullHd1080, AspectRatio::Square, (1080, 1080)),
            (Resolution::Uhd4k, AspectRatio::Square, (2160, 2160)),
        ];
        for (res, aspect, dims) in expected {
            assert_eq!(res.dimensions(aspect), dims, "{res} {aspect}");
        }
    }

    #[test]
    fn test_dimensions_are_even() {
        for res in Resolution::ALL {
            for aspect in AspectRatio::ALL {
                let (w, h) = res.dimensions(*aspect);
                assert_eq!(w % 2, 0);
                assert_eq!(h % 2, 0);
            }
        }
    }

    #[test]
    fn test_resolution_serde_names() {
        assert_eq!(serde_json::to_string(&Resolution::Uhd4k).unwrap(), "\"4k\"");
        assert_eq!(
            serde_json::from_str::<Resolution>("\"720p\"").unwrap(),
            Resolution::Hd720
        );
        assert_eq!("2160p".parse::<Resolution>().unwrap(), Resolution::Uhd4k);
        assert!("8k".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_aspect_and_format_parse() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("Square".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert_eq!("MOV".parse::<OutputFormat>().unwrap(), OutputFormat::Mov);
        assert_eq!(OutputFormat::Mov.content_type(), "video/quicktime");
        assert!("avi".parse::<OutputFormat>().is_err());
    }
}
