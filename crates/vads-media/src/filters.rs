//! FFmpeg filter builders.

use vads_models::{CaptionPosition, CaptionStyle, MotionEffect, Rgba};

/// Upper bound of the Ken Burns zoom factor.
pub const MAX_ZOOM: f64 = 1.15;
/// Longest fade applied at a clip boundary.
pub const MAX_FADE_SECS: f64 = 0.5;
/// Script height libass assumes for SRT input; style sizes are in these units.
pub const ASS_PLAY_RES_Y: u32 = 288;

/// Fit the frame inside `width`x`height` and pad the remainder with black
/// (letterbox/pillarbox, never crop).
pub fn scale_pad(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1",
        w = width,
        h = height
    )
}

/// Zoom filter for a still image rendered as `frames` output frames.
///
/// Zoom moves linearly between 1.0 and [`MAX_ZOOM`], centred, and is clamped
/// so it never leaves that range. Returns `None` for static clips.
pub fn zoompan(motion: MotionEffect, width: u32, height: u32, fps: u32, frames: u64) -> Option<String> {
    let span = MAX_ZOOM - 1.0;
    let step = span / frames.max(1) as f64;
    let z = match motion {
        MotionEffect::Static => return None,
        MotionEffect::ZoomIn => format!("min(1+{step:.6}*on,{MAX_ZOOM})"),
        MotionEffect::ZoomOut => format!("max({MAX_ZOOM}-{step:.6}*on,1)"),
    };
    Some(format!(
        "zoompan=z='{z}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={width}x{height}:fps={fps}"
    ))
}

/// Fade length for a clip of `duration` seconds.
pub fn fade_secs(duration: f64) -> f64 {
    (duration / 4.0).min(MAX_FADE_SECS)
}

/// Fade in from and out to black over the clip edges.
pub fn fade_in_out(duration: f64) -> String {
    let d = fade_secs(duration);
    format!(
        "fade=t=in:st=0:d={d:.3},fade=t=out:st={start:.3}:d={d:.3}",
        start = (duration - d).max(0.0)
    )
}

/// Hold the last frame for `secs` more seconds.
pub fn tpad_clone(secs: f64) -> String {
    format!("tpad=stop_mode=clone:stop_duration={secs:.3}")
}

/// Scale for thumbnail generation.
pub fn thumbnail(width: u32) -> String {
    format!("scale={}:-2", width)
}

/// Escape a value for use as a filter option inside a filtergraph.
///
/// Two levels apply: the option parser (`\ ' :`) and the graph parser
/// (`\ ' [ ] , ;`).
pub fn escape_filter_value(value: &str) -> String {
    let mut level1 = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            level1.push('\\');
        }
        level1.push(c);
    }
    let mut level2 = String::with_capacity(level1.len());
    for c in level1.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            level2.push('\\');
        }
        level2.push(c);
    }
    level2
}

/// ASS colour literal `&HAABBGGRR` (ASS alpha: 00 opaque, FF transparent).
pub fn ass_colour(c: Rgba) -> String {
    format!("&H{:02X}{:02X}{:02X}{:02X}", 255 - c.a, c.b, c.g, c.r)
}

/// Numpad-style ASS alignment for a caption position.
pub fn caption_alignment(position: CaptionPosition) -> u8 {
    match position {
        CaptionPosition::Top => 8,
        CaptionPosition::Center => 5,
        CaptionPosition::Bottom => 2,
    }
}

/// Vertical margin in output pixels for a caption position.
pub fn caption_margin_px(position: CaptionPosition, font_size: u32) -> u32 {
    match position {
        CaptionPosition::Top => font_size,
        CaptionPosition::Center => 0,
        CaptionPosition::Bottom => font_size * 2,
    }
}

fn to_script_units(px: u32, frame_height: u32) -> u32 {
    let scaled = px as f64 * ASS_PLAY_RES_Y as f64 / frame_height.max(1) as f64;
    scaled.round() as u32
}

fn sanitize_font(font: &str) -> String {
    font.chars()
        .filter(|c| !matches!(c, '\'' | ':' | ',' | '\\' | ';' | '[' | ']'))
        .collect()
}

/// `force_style` value for the `subtitles` filter.
///
/// Sizes are given in output pixels and converted to libass script units.
pub fn caption_force_style(style: &CaptionStyle, frame_height: u32) -> String {
    let primary = Rgba::parse(&style.color).unwrap_or(Rgba {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    });
    let font_size = to_script_units(style.font_size, frame_height).max(1);
    let margin_v = to_script_units(caption_margin_px(style.position, style.font_size), frame_height);

    let mut fields = vec![
        format!("FontName={}", sanitize_font(&style.font)),
        format!("FontSize={font_size}"),
        format!("PrimaryColour={}", ass_colour(primary)),
    ];

    match style.background.as_deref().and_then(Rgba::parse) {
        Some(bg) => {
            let bg = ass_colour(bg);
            fields.push(format!("OutlineColour={bg}"));
            fields.push(format!("BackColour={bg}"));
            fields.push("BorderStyle=3".to_string());
            fields.push("Outline=1".to_string());
        }
        None => {
            fields.push("OutlineColour=&H00000000".to_string());
            fields.push("BorderStyle=1".to_string());
            fields.push("Outline=2".to_string());
        }
    }

    fields.push("Shadow=0".to_string());
    fields.push(format!("Alignment={}", caption_alignment(style.position)));
    fields.push(format!("MarginV={margin_v}"));
    fields.join(",")
}

/// Burn an SRT file into the video.
pub fn subtitles(srt_path: &str, style: &CaptionStyle, frame_height: u32) -> String {
    format!(
        "subtitles=filename={}:force_style='{}'",
        escape_filter_value(srt_path),
        caption_force_style(style, frame_height)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_pad_never_crops() {
        let filter = scale_pad(608, 1080);
        assert!(filter.contains("force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=608:1080:(ow-iw)/2:(oh-ih)/2"));
        assert!(!filter.contains("crop"));
    }

    #[test]
    fn test_zoompan_bounds() {
        assert!(zoompan(MotionEffect::Static, 608, 1080, 30, 90).is_none());

        let zin = zoompan(MotionEffect::ZoomIn, 608, 1080, 30, 150).unwrap();
        assert!(zin.contains("min(1+0.001000*on,1.15)"));
        assert!(zin.contains("s=608x1080"));

        let zout = zoompan(MotionEffect::ZoomOut, 608, 1080, 30, 150).unwrap();
        assert!(zout.contains("max(1.15-0.001000*on,1)"));
    }

    #[test]
    fn test_fades_are_bounded_by_clip() {
        assert!((fade_secs(1.0) - 0.25).abs() < 1e-9);
        assert!((fade_secs(10.0) - 0.5).abs() < 1e-9);
        assert_eq!(
            fade_in_out(4.0),
            "fade=t=in:st=0:d=0.500,fade=t=out:st=3.500:d=0.500"
        );
    }

    #[test]
    fn test_ass_colour() {
        let c = Rgba::parse("#FF8000").unwrap();
        assert_eq!(ass_colour(c), "&H000080FF");
        let c = Rgba::parse("#00000080").unwrap();
        assert_eq!(ass_colour(c), "&H7F000000");
    }

    #[test]
    fn test_force_style_positions() {
        let mut style = CaptionStyle {
            font_size: 60,
            ..Default::default()
        };

        // 60px at 1080 high -> 16 script units
        let bottom = caption_force_style(&style, 1080);
        assert!(bottom.contains("FontSize=16"));
        assert!(bottom.contains("Alignment=2"));
        assert!(bottom.contains("MarginV=32"));
        assert!(bottom.contains("BorderStyle=3"));

        style.position = CaptionPosition::Top;
        let top = caption_force_style(&style, 1080);
        assert!(top.contains("Alignment=8"));
        assert!(top.contains("MarginV=16"));

        style.position = CaptionPosition::Center;
        style.background = None;
        let center = caption_force_style(&style, 1080);
        assert!(center.contains("Alignment=5"));
        assert!(center.contains("MarginV=0"));
        assert!(center.contains("BorderStyle=1"));
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("/tmp/job/captions.srt"), "/tmp/job/captions.srt");
        assert_eq!(escape_filter_value("C:/a.srt"), "C\\\\:/a.srt");
        assert_eq!(escape_filter_value("a,b"), "a\\,b");
    }

    #[test]
    fn test_subtitles_filter() {
        let f = subtitles("/tmp/x/captions.srt", &CaptionStyle::default(), 1080);
        assert!(f.starts_with("subtitles=filename=/tmp/x/captions.srt:force_style='FontName=Arial,"));
        assert!(f.ends_with("'"));
    }
}
