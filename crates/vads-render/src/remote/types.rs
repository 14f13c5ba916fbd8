//! Wire types of the remote rendering service.
//!
//! An edit is a stack of tracks; the first track is drawn on top. Each track
//! holds clips placed at absolute start times.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub timeline: EditTimeline,
    pub output: EditOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditTimeline {
    pub background: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub clips: Vec<TrackClip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackClip {
    pub asset: Asset,
    pub start: f64,
    pub length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<ClipTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipTransition {
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<String>,
    #[serde(rename = "out", default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Asset {
    Image {
        src: String,
    },
    Video {
        src: String,
        /// Source audio is muted; sound comes from the audio tracks
        volume: f64,
    },
    Audio {
        src: String,
        volume: f64,
    },
    Title {
        text: String,
        font: String,
        size: u32,
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background: Option<String>,
        position: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOutput {
    pub format: String,
    pub fps: u32,
    pub size: OutputSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

/// Body of `POST /render`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub response: Option<SubmitBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBody {
    pub id: String,
}

/// Body of `GET /render/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub response: StatusBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
