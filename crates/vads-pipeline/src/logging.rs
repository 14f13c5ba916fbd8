//! Structured compile logging.
//!
//! Every event of one compile carries the same `compile_id`, `project_id`
//! and `backend` fields so a single run can be followed through the logs.

use tracing::{error, info, warn, Span};

use vads_models::ProjectId;

/// Logger scoped to one compile invocation.
#[derive(Debug, Clone)]
pub struct CompileLogger {
    compile_id: String,
    project_id: String,
    backend: &'static str,
}

impl CompileLogger {
    pub fn new(project_id: &ProjectId, backend: &'static str) -> Self {
        Self {
            compile_id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            backend,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend,
            "Compile started: {}", message
        );
    }

    /// Log the end of a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend,
            stage,
            "Compile progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend,
            "Compile warning: {}", message
        );
    }

    /// Log a failure with its kind; `detail` may hold tool output.
    pub fn log_error(&self, kind: &str, message: &str, detail: Option<&str>) {
        error!(
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend,
            kind,
            detail = detail.unwrap_or(""),
            "Compile failed: {}", message
        );
    }

    pub fn log_completion(&self, url: &str, duration: f64, elapsed_secs: f64) {
        info!(
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend,
            url,
            duration,
            elapsed_secs,
            "Compile completed"
        );
    }

    pub fn compile_id(&self) -> &str {
        &self.compile_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Span wrapping the whole compile.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "compile",
            compile_id = %self.compile_id,
            project_id = %self.project_id,
            backend = self.backend
        )
    }
}
