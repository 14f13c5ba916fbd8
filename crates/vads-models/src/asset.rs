//! Media asset records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{AssetId, ProjectId, SceneId};

/// Kind of stored media; decides which pipeline stage consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Image,
    VideoClip,
    Voiceover,
    Music,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::VideoClip => "video_clip",
            AssetType::Voiceover => "voiceover",
            AssetType::Music => "music",
        }
    }

    /// Whether assets of this type are attached to a single scene.
    pub fn is_per_scene(&self) -> bool {
        matches!(self, AssetType::Image | AssetType::VideoClip)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = AssetTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(AssetType::Image),
            "video_clip" | "video" => Ok(AssetType::VideoClip),
            "voiceover" => Ok(AssetType::Voiceover),
            "music" => Ok(AssetType::Music),
            _ => Err(AssetTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown asset type: {0}")]
pub struct AssetTypeParseError(String);

/// Metadata attached to an asset by whichever stage produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetMetadata {
    /// Producer of the asset (e.g. "replicate", "fal", "openai", "compilation")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Prompt used to generate the asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Duration hint in seconds (voiceover, music, video clips)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A stored media file belonging to a project (and optionally a scene).
///
/// Assets are immutable: regenerating creates a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAsset {
    pub id: AssetId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<SceneId>,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub url: String,
    #[serde(default)]
    pub metadata: AssetMetadata,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Usable duration hint, if any.
    pub fn duration_hint(&self) -> Option<f64> {
        self.metadata.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Recency ordering: later `created_at` wins, ties broken by id so the
    /// choice is stable across runs.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Pick the most recently created asset from an iterator.
    pub fn latest<'a, I>(assets: I) -> Option<&'a MediaAsset>
    where
        I: IntoIterator<Item = &'a MediaAsset>,
    {
        assets.into_iter().max_by(|a, b| a.recency_cmp(b))
    }
}
