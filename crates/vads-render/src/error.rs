//! Render error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use vads_media::MediaError;
use vads_models::ValidationError;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Stage of a render a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStep {
    /// Sending the job to the remote service
    Submit,
    /// Remote rendering (reported by the service)
    Render,
    Fetch,
    Materialize,
    Concat,
    Captions,
    Encode,
    /// Moving the output into place
    Save,
}

impl RenderStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStep::Submit => "submit",
            RenderStep::Render => "render",
            RenderStep::Fetch => "fetch",
            RenderStep::Materialize => "materialize",
            RenderStep::Concat => "concat",
            RenderStep::Captions => "captions",
            RenderStep::Encode => "encode",
            RenderStep::Save => "save",
        }
    }
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid timeline: {0}")]
    Invalid(#[from] ValidationError),

    #[error("render failed at {step}: {message}")]
    Failed {
        step: RenderStep,
        message: String,
        /// Tool output for logs; never shown to users
        detail: Option<String>,
    },

    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn failed(step: RenderStep, message: impl Into<String>) -> Self {
        Self::Failed {
            step,
            message: message.into(),
            detail: None,
        }
    }

    /// Attribute a media error to a step.
    pub fn from_media(step: RenderStep, err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => RenderError::Cancelled,
            MediaError::Timeout(secs) => RenderError::Timeout(Duration::from_secs(secs)),
            other => {
                let detail = other.stderr().map(str::to_string);
                RenderError::Failed {
                    step,
                    message: other.to_string(),
                    detail,
                }
            }
        }
    }

    /// Step a failure happened in, if it is a step failure.
    pub fn step(&self) -> Option<RenderStep> {
        match self {
            RenderError::Failed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }
}
