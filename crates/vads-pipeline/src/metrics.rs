//! Compile metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to
//! the embedding service.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const COMPILES_STARTED_TOTAL: &str = "vads_compiles_started_total";
    pub const COMPILES_COMPLETED_TOTAL: &str = "vads_compiles_completed_total";
    pub const COMPILES_FAILED_TOTAL: &str = "vads_compiles_failed_total";
    pub const COMPILE_DURATION_SECONDS: &str = "vads_compile_duration_seconds";
    pub const RENDER_DURATION_SECONDS: &str = "vads_render_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vads_upload_duration_seconds";
    pub const VIDEO_DURATION_SECONDS: &str = "vads_video_duration_seconds";
}

pub fn record_compile_started(backend: &str) {
    let labels = [("backend", backend.to_string())];
    counter!(names::COMPILES_STARTED_TOTAL, &labels).increment(1);
}

pub fn record_compile_completed(backend: &str, elapsed_secs: f64, video_secs: f64) {
    let labels = [("backend", backend.to_string())];
    counter!(names::COMPILES_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::COMPILE_DURATION_SECONDS, &labels).record(elapsed_secs);
    histogram!(names::VIDEO_DURATION_SECONDS).record(video_secs);
}

pub fn record_compile_failed(backend: &str, kind: &str) {
    let labels = [
        ("backend", backend.to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::COMPILES_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_render_duration(backend: &str, secs: f64) {
    let labels = [("backend", backend.to_string())];
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(secs);
}

pub fn record_upload_duration(storage: &str, secs: f64) {
    let labels = [("storage", storage.to_string())];
    histogram!(names::UPLOAD_DURATION_SECONDS, &labels).record(secs);
}
