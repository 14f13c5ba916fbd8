//! Shared data models for the Viral Ads Now compilation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Projects, scenes and media assets read from the project store
//! - Output formats (resolution presets, aspect ratios, containers)
//! - The declarative compilation timeline handed to render backends
//! - Render job status tracking
//! - Encoding configuration and compile requests

pub mod asset;
pub mod encoding;
pub mod format;
pub mod ids;
pub mod project;
pub mod render_job;
pub mod request;
pub mod timeline;

// Re-export common types
pub use asset::{AssetMetadata, AssetType, MediaAsset};
pub use encoding::EncodingConfig;
pub use format::{AspectRatio, FormatParseError, OutputFormat, Resolution};
pub use ids::{AssetId, OrganizationId, ProjectId, SceneId};
pub use project::{Project, Scene, WorkflowStep};
pub use render_job::{RenderJob, RenderStatus, TransitionError};
pub use request::CompileRequest;
pub use timeline::{
    Caption, CaptionPosition, CaptionStyle, ClipKind, MotionEffect, Rgba, TimelineParseError,
    Transition, ValidationError, VideoClip, VideoCompilationOptions,
};
