//! Remote declarative renderer.
//!
//! The timeline is translated into an edit, submitted to the hosted render
//! service and polled until the service reports a finished URL.

pub mod client;
pub mod poll;
pub mod translate;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vads_models::VideoCompilationOptions;

use crate::backend::{RenderBackend, RenderOutput};
use crate::error::{RenderError, RenderResult, RenderStep};

pub use client::{ApiError, HttpRenderApi, JobState, RemoteRenderConfig, RenderApi};
pub use poll::{poll_job, PollConfig};
pub use translate::build_edit;
pub use types::Edit;

/// Render backend driving a hosted render service.
pub struct RemoteRenderer<A = HttpRenderApi> {
    api: A,
    poll: PollConfig,
    submit_retries: u32,
}

impl RemoteRenderer<HttpRenderApi> {
    pub fn new(config: RemoteRenderConfig) -> RenderResult<Self> {
        let poll = PollConfig {
            interval: config.poll_interval,
            max_backoff: config.max_backoff,
            max_wait: config.max_wait,
            max_consecutive_errors: config.max_poll_errors,
        };
        let submit_retries = config.submit_retries;
        let api = HttpRenderApi::new(config)
            .map_err(|e| RenderError::failed(RenderStep::Submit, e.to_string()))?;
        Ok(Self {
            api,
            poll,
            submit_retries,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(RemoteRenderConfig::from_env())
    }
}

impl<A: RenderApi> RemoteRenderer<A> {
    /// Renderer over any API implementation.
    pub fn with_api(api: A, poll: PollConfig) -> Self {
        Self {
            api,
            poll,
            submit_retries: 0,
        }
    }

    pub fn with_submit_retries(mut self, retries: u32) -> Self {
        self.submit_retries = retries;
        self
    }

    /// Submit with exponential backoff while the service is unreachable.
    async fn submit(&self, edit: &Edit) -> RenderResult<String> {
        let mut attempt = 0;
        loop {
            match self.api.submit(edit).await {
                Ok(id) => return Ok(id),
                Err(e) if e.is_resubmittable() && attempt < self.submit_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.submit_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Render submission failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(RenderError::failed(RenderStep::Submit, e.to_string())),
            }
        }
    }
}

#[async_trait]
impl<A: RenderApi> RenderBackend for RemoteRenderer<A> {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn compile(
        &self,
        options: &VideoCompilationOptions,
        cancel: CancellationToken,
    ) -> RenderResult<RenderOutput> {
        options.validate()?;
        let edit = build_edit(options);

        let job_id = tokio::select! {
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            id = self.submit(&edit) => id?,
        };
        info!(
            job_id = %job_id,
            clips = options.clips.len(),
            tracks = edit.timeline.tracks.len(),
            "Submitted render job"
        );

        let url = poll_job(&self.api, &job_id, &self.poll, &cancel).await?;
        Ok(RenderOutput::Url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vads_models::VideoClip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> VideoCompilationOptions {
        serde_json::from_value(serde_json::json!({
            "clips": [{"type": "image", "url": "https://cdn/1.png", "duration": 3.0}]
        }))
        .unwrap()
    }

    fn renderer(server: &MockServer) -> RemoteRenderer {
        RemoteRenderer::new(RemoteRenderConfig {
            base_url: server.uri(),
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_compile_returns_service_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "success": true,
                "response": {"id": "job-7"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/render/job-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"status": "done", "url": "https://cdn/job-7.mp4"}
            })))
            .mount(&server)
            .await;

        let output = renderer(&server)
            .compile(&options(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.as_url(), Some("https://cdn/job-7.mp4"));
    }

    #[tokio::test]
    async fn test_invalid_timeline_never_submitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut opts = options();
        opts.clips.push(VideoClip::image("https://cdn/2.png", 0.0));
        let err = renderer(&server)
            .compile(&opts, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_rejected_submission_is_submit_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = renderer(&server)
            .compile(&options(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(RenderStep::Submit));
    }

    #[tokio::test]
    async fn test_unavailable_service_is_resubmitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = renderer(&server)
            .compile(&options(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(RenderStep::Submit));
    }

    #[tokio::test]
    async fn test_timed_out_submission_is_not_resubmitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({
                        "success": true,
                        "response": {"id": "job-8"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let renderer = RemoteRenderer::new(RemoteRenderConfig {
            base_url: server.uri(),
            request_timeout: Duration::from_millis(100),
            submit_retries: 2,
            ..Default::default()
        })
        .unwrap();
        let err = renderer
            .compile(&options(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(RenderStep::Submit));
    }
}
