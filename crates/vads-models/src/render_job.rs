//! Render job status tracking.
//!
//! A render job lives for one compile invocation. Both backends drive the
//! same status machine so logs and progress read identically.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Render job status.
///
/// `queued → fetching → rendering → saving → done`, with `failed` reachable
/// from any non-terminal state. Stages may be skipped (a remote service can
/// report `rendering` straight after `queued`) but never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    #[default]
    Queued,
    Fetching,
    Rendering,
    Saving,
    Done,
    Failed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Queued => "queued",
            RenderStatus::Fetching => "fetching",
            RenderStatus::Rendering => "rendering",
            RenderStatus::Saving => "saving",
            RenderStatus::Done => "done",
            RenderStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStatus::Done | RenderStatus::Failed)
    }

    /// Whether moving from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: RenderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RenderStatus::Failed => true,
            _ => next >= *self,
        }
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RenderStatus {
    type Err = RenderStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(RenderStatus::Queued),
            "fetching" => Ok(RenderStatus::Fetching),
            "rendering" => Ok(RenderStatus::Rendering),
            "saving" => Ok(RenderStatus::Saving),
            "done" => Ok(RenderStatus::Done),
            "failed" => Ok(RenderStatus::Failed),
            _ => Err(RenderStatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown render status: {0}")]
pub struct RenderStatusParseError(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal render status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: RenderStatus,
    pub to: RenderStatus,
}

/// A single render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Opaque id (service job id for remote renders, generated locally otherwise)
    pub id: String,
    /// Backend that owns the job
    pub backend: String,
    pub status: RenderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(id: impl Into<String>, backend: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            backend: backend.into(),
            status: RenderStatus::Queued,
            url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `status`. Re-reporting the current status is a no-op.
    pub fn advance(&mut self, status: RenderStatus) -> Result<(), TransitionError> {
        if status == self.status && !status.is_terminal() {
            return Ok(());
        }
        if !self.status.can_transition_to(status) {
            return Err(TransitionError {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job done with its output location.
    pub fn complete(&mut self, url: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(RenderStatus::Done)?;
        self.url = Some(url.into());
        Ok(())
    }

    /// Mark the job failed with a message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(RenderStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut job = RenderJob::new("job-1", "local");
        job.advance(RenderStatus::Fetching).unwrap();
        job.advance(RenderStatus::Fetching).unwrap();
        job.advance(RenderStatus::Saving).unwrap();
        job.complete("file:///tmp/out.mp4").unwrap();
        assert!(job.is_terminal());
        assert_eq!(job.url.as_deref(), Some("file:///tmp/out.mp4"));
    }

    #[test]
    fn test_backwards_and_post_terminal_rejected() {
        let mut job = RenderJob::new("job-1", "remote");
        job.advance(RenderStatus::Rendering).unwrap();
        let err = job.advance(RenderStatus::Fetching).unwrap_err();
        assert_eq!(err.from, RenderStatus::Rendering);

        job.fail("boom").unwrap();
        assert!(job.advance(RenderStatus::Done).is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("RENDERING".parse::<RenderStatus>().unwrap(), RenderStatus::Rendering);
        assert!("paused".parse::<RenderStatus>().is_err());
        assert_eq!(RenderStatus::Saving.to_string(), "saving");
    }
}
