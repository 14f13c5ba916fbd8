//! HTTP client for the remote rendering service.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::debug;

use vads_models::RenderStatus;

use super::types::{Edit, StatusResponse, SubmitResponse};

/// Configuration for the remote renderer.
#[derive(Debug, Clone)]
pub struct RemoteRenderConfig {
    /// Base URL of the render API
    pub base_url: String,
    /// Sent as `x-api-key` when set
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries for job submission
    pub submit_retries: u32,
    /// Base status poll interval
    pub poll_interval: Duration,
    /// Upper bound for poll backoff after transient errors
    pub max_backoff: Duration,
    /// Give up on a job after this long
    pub max_wait: Duration,
    /// Consecutive transient poll errors tolerated
    pub max_poll_errors: u32,
}

impl Default for RemoteRenderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            submit_retries: 2,
            poll_interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            max_wait: Duration::from_secs(900),
            max_poll_errors: 5,
        }
    }
}

impl RemoteRenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("REMOTE_RENDER_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("REMOTE_RENDER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(env_parse("REMOTE_RENDER_TIMEOUT", 30)),
            submit_retries: env_parse("REMOTE_RENDER_RETRIES", defaults.submit_retries),
            poll_interval: Duration::from_millis(env_parse("REMOTE_RENDER_POLL_INTERVAL_MS", 2000)),
            max_backoff: Duration::from_millis(env_parse("REMOTE_RENDER_MAX_BACKOFF_MS", 30_000)),
            max_wait: Duration::from_secs(env_parse("REMOTE_RENDER_MAX_WAIT_SECS", 900)),
            max_poll_errors: env_parse("REMOTE_RENDER_MAX_POLL_ERRORS", defaults.max_poll_errors),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Errors talking to the render API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("render service unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("render service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response from render service: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Unavailable { .. } => true,
            ApiError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether the request certainly never created a job, so sending it
    /// again cannot start a duplicate render. A timed-out POST may already
    /// have been accepted.
    pub fn is_resubmittable(&self) -> bool {
        match self {
            ApiError::Unavailable { .. } => true,
            ApiError::Network(e) => e.is_connect(),
            _ => false,
        }
    }
}

/// Job state as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    pub status: RenderStatus,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl JobState {
    pub fn new(status: RenderStatus) -> Self {
        Self {
            status,
            url: None,
            error: None,
        }
    }
}

/// Operations of the render API.
#[async_trait]
pub trait RenderApi: Send + Sync {
    /// Queue an edit; returns the job id.
    async fn submit(&self, edit: &Edit) -> Result<String, ApiError>;

    async fn status(&self, job_id: &str) -> Result<JobState, ApiError>;

    async fn cancel(&self, job_id: &str) -> Result<(), ApiError>;
}

/// reqwest implementation of [`RenderApi`].
pub struct HttpRenderApi {
    http: Client,
    config: RemoteRenderConfig,
}

impl HttpRenderApi {
    pub fn new(config: RemoteRenderConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteRenderConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let builder = self.http.request(method, url);
        match &self.config.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(ApiError::Unavailable { status: code, message })
    } else {
        Err(ApiError::Rejected { status: code, message })
    }
}

#[async_trait]
impl RenderApi for HttpRenderApi {
    async fn submit(&self, edit: &Edit) -> Result<String, ApiError> {
        let response = self.request(Method::POST, "render").json(edit).send().await?;
        let body: SubmitResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        match body.response {
            Some(job) if body.success => {
                debug!(job_id = %job.id, "Render job accepted");
                Ok(job.id)
            }
            _ => Err(ApiError::InvalidResponse(
                body.message.unwrap_or_else(|| "submission not accepted".to_string()),
            )),
        }
    }

    async fn status(&self, job_id: &str) -> Result<JobState, ApiError> {
        let path = format!("render/{}", urlencode(job_id));
        let response = self.request(Method::GET, &path).send().await?;
        let body: StatusResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let status = body
            .response
            .status
            .parse::<RenderStatus>()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        Ok(JobState {
            status,
            url: body.response.url,
            error: body.response.error,
        })
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ApiError> {
        let path = format!("render/{}", urlencode(job_id));
        let response = self.request(Method::DELETE, &path).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}
