//! Project and scene records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{OrganizationId, ProjectId, SceneId};

/// One ad being built through the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: ProjectId,
    /// Owning organization (storage paths are keyed by it)
    pub organization_id: OrganizationId,
    pub name: String,
    /// Current wizard step
    #[serde(default)]
    pub current_step: WorkflowStep,
    pub created_at: DateTime<Utc>,
}

/// One narrative/visual beat of the ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub id: SceneId,
    pub project_id: ProjectId,
    /// 1-based ordinal position, unique and contiguous within a project
    pub scene_number: u32,
    /// Portion of the ad script spoken during this scene
    #[serde(default)]
    pub script_excerpt: String,
    #[serde(default)]
    pub visual_description: String,
    #[serde(default)]
    pub image_prompt: String,
    /// Explicit duration in seconds, when the script breakdown supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Free-form metadata (e.g. a video-generation prompt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Scene {
    /// Returns the explicit duration if it is usable (finite and positive).
    pub fn explicit_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Script text trimmed of surrounding whitespace.
    pub fn script_text(&self) -> &str {
        self.script_excerpt.trim()
    }
}

/// Wizard step pointer stored on the project.
///
/// The compilation pipeline only ever writes [`WorkflowStep::terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    #[default]
    Product,
    Script,
    Scenes,
    Images,
    VideoClips,
    Audio,
    Compile,
    Publish,
}

impl WorkflowStep {
    pub const ALL: &'static [WorkflowStep] = &[
        WorkflowStep::Product,
        WorkflowStep::Script,
        WorkflowStep::Scenes,
        WorkflowStep::Images,
        WorkflowStep::VideoClips,
        WorkflowStep::Audio,
        WorkflowStep::Compile,
        WorkflowStep::Publish,
    ];

    /// Step written once a compiled video has been persisted.
    pub const fn terminal() -> Self {
        WorkflowStep::Publish
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Product => "product",
            WorkflowStep::Script => "script",
            WorkflowStep::Scenes => "scenes",
            WorkflowStep::Images => "images",
            WorkflowStep::VideoClips => "video_clips",
            WorkflowStep::Audio => "audio",
            WorkflowStep::Compile => "compile",
            WorkflowStep::Publish => "publish",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::terminal()
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = WorkflowStepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == lower)
            .ok_or_else(|| WorkflowStepParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown workflow step: {0}")]
pub struct WorkflowStepParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(duration: Option<f64>) -> Scene {
        Scene {
            id: SceneId::from("s1"),
            project_id: ProjectId::from("p1"),
            scene_number: 1,
            script_excerpt: "  Meet the bottle.  ".to_string(),
            visual_description: String::new(),
            image_prompt: String::new(),
            duration,
            metadata: None,
        }
    }

    #[test]
    fn test_explicit_duration_filters_invalid_values() {
        assert_eq!(scene(Some(4.0)).explicit_duration(), Some(4.0));
        assert_eq!(scene(Some(0.0)).explicit_duration(), None);
        assert_eq!(scene(Some(-2.0)).explicit_duration(), None);
        assert_eq!(scene(Some(f64::NAN)).explicit_duration(), None);
        assert_eq!(scene(None).explicit_duration(), None);
    }

    #[test]
    fn test_script_text_is_trimmed() {
        assert_eq!(scene(None).script_text(), "Meet the bottle.");
    }

    #[test]
    fn test_workflow_step_parse_and_terminal() {
        assert_eq!("video_clips".parse::<WorkflowStep>().unwrap(), WorkflowStep::VideoClips);
        assert_eq!("PUBLISH".parse::<WorkflowStep>().unwrap(), WorkflowStep::Publish);
        assert!("launch".parse::<WorkflowStep>().is_err());
        assert!(WorkflowStep::terminal().is_terminal());
        assert_eq!(WorkflowStep::ALL.last(), Some(&WorkflowStep::terminal()));
    }
}
