//! Pipeline error taxonomy.

use std::fmt;
use thiserror::Error;

use vads_render::RenderError;
use vads_storage::StorageError;

use crate::store::StoreError;

pub type PipelineResult<T> = Result<T, CompileError>;

/// Coarse error classes reported to callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    RenderFailed,
    Timeout,
    StorageError,
    ValidationError,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::RenderFailed => "render_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Upload of a finished render failed. `rendered_url` still points at
    /// the render service's copy, so persistence can be retried without
    /// rendering again.
    #[error("Failed to persist render: {source}")]
    Persist {
        #[source]
        source: StorageError,
        rendered_url: Option<String>,
    },

    #[error("Project store error: {0}")]
    Store(#[from] StoreError),

    #[error("Compilation cancelled")]
    Cancelled,
}

impl CompileError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persist(source: StorageError, rendered_url: Option<String>) -> Self {
        Self::Persist {
            source,
            rendered_url,
        }
    }

    /// Output URL of a render that could not be stored.
    pub fn rendered_url(&self) -> Option<&str> {
        match self {
            CompileError::Persist { rendered_url, .. } => rendered_url.as_deref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::NotFound(_) => ErrorKind::NotFound,
            CompileError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            CompileError::Validation(_) => ErrorKind::ValidationError,
            CompileError::Render(e) => match e {
                RenderError::Invalid(_) => ErrorKind::ValidationError,
                RenderError::Failed { .. } => ErrorKind::RenderFailed,
                RenderError::Timeout(_) => ErrorKind::Timeout,
                RenderError::Cancelled => ErrorKind::Cancelled,
            },
            CompileError::Storage(_) | CompileError::Persist { .. } => ErrorKind::StorageError,
            CompileError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            CompileError::Store(_) => ErrorKind::StorageError,
            CompileError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Message safe to show users: no tool output, paths or URLs.
    pub fn public_message(&self) -> String {
        match self {
            CompileError::NotFound(what) => format!("{what} not found"),
            CompileError::PreconditionFailed(msg) | CompileError::Validation(msg) => msg.clone(),
            CompileError::Render(RenderError::Invalid(e)) => format!("invalid timeline: {e}"),
            CompileError::Render(RenderError::Failed { step, .. }) => {
                format!("video rendering failed while running the {step} step")
            }
            CompileError::Render(RenderError::Timeout(_)) => "video rendering took too long".to_string(),
            CompileError::Render(RenderError::Cancelled) | CompileError::Cancelled => {
                "compilation was cancelled".to_string()
            }
            CompileError::Storage(_) | CompileError::Persist { .. } => {
                "failed to save the compiled video".to_string()
            }
            CompileError::Store(StoreError::NotFound(what)) => format!("{what} not found"),
            CompileError::Store(_) => "failed to access project data".to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<validator::ValidationErrors> for CompileError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields = e
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let codes: Vec<&str> = errors.iter().map(|e| &*e.code).collect();
                format!("{field} ({})", codes.join(", "))
            })
            .collect::<Vec<_>>();
        fields.sort();
        CompileError::Validation(format!("invalid fields: {}", fields.join("; ")))
    }
}
