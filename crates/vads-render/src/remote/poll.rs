//! Job status polling.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vads_models::{RenderJob, RenderStatus};

use super::client::RenderApi;
use crate::error::{RenderError, RenderResult, RenderStep};

/// Polling behaviour.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status checks while the job is healthy
    pub interval: Duration,
    /// Upper bound for the delay after transient errors
    pub max_backoff: Duration,
    /// Total time allowed for the job
    pub max_wait: Duration,
    /// Consecutive transient errors tolerated before giving up
    pub max_consecutive_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            max_wait: Duration::from_secs(900),
            max_consecutive_errors: 5,
        }
    }
}

impl PollConfig {
    /// Delay after the `errors`-th consecutive transient error.
    pub fn backoff(&self, errors: u32) -> Duration {
        let factor = 2u32.saturating_pow(errors.min(16));
        self.interval.saturating_mul(factor).min(self.max_backoff)
    }
}

enum Wake {
    Tick,
    Cancelled,
}

/// Poll `job_id` until it finishes, fails, times out or is cancelled.
///
/// Returns the output URL of a finished job. On timeout or cancellation the
/// job is deleted on the service, best effort.
pub async fn poll_job<A>(
    api: &A,
    job_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> RenderResult<String>
where
    A: RenderApi + ?Sized,
{
    let deadline = Instant::now() + config.max_wait;
    let mut job = RenderJob::new(job_id, "remote");
    let mut errors = 0u32;
    let mut delay = config.interval;

    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!(job_id, max_wait_secs = config.max_wait.as_secs(), "Render job timed out");
            cancel_job(api, job_id).await;
            return Err(RenderError::Timeout(config.max_wait));
        }

        let wake = tokio::select! {
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = sleep(delay.min(deadline - now)) => Wake::Tick,
        };
        if let Wake::Cancelled = wake {
            cancel_job(api, job_id).await;
            return Err(RenderError::Cancelled);
        }
        if Instant::now() >= deadline {
            continue;
        }

        let state = tokio::select! {
            _ = cancel.cancelled() => None,
            state = api.status(job_id) => Some(state),
        };
        let Some(state) = state else {
            cancel_job(api, job_id).await;
            return Err(RenderError::Cancelled);
        };

        match state {
            Ok(state) => {
                errors = 0;
                delay = config.interval;
                if let Err(e) = job.advance(state.status) {
                    warn!(job_id, error = %e, "Render service reported status out of order");
                }

                match state.status {
                    RenderStatus::Done => {
                        return match state.url {
                            Some(url) => {
                                info!(job_id, url = %url, "Render job done");
                                Ok(url)
                            }
                            None => Err(RenderError::failed(
                                RenderStep::Render,
                                "render finished without an output URL",
                            )),
                        };
                    }
                    RenderStatus::Failed => {
                        let message = state
                            .error
                            .unwrap_or_else(|| "render failed".to_string());
                        warn!(job_id, error = %message, "Render job failed");
                        return Err(RenderError::failed(RenderStep::Render, message));
                    }
                    status => debug!(job_id, status = %status, "Render job in progress"),
                }
            }
            Err(e) if e.is_retryable() && errors < config.max_consecutive_errors => {
                errors += 1;
                delay = config.backoff(errors);
                warn!(
                    job_id,
                    attempt = errors,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient error polling render job, backing off"
                );
            }
            Err(e) => {
                return Err(RenderError::failed(RenderStep::Render, e.to_string()));
            }
        }
    }
}

async fn cancel_job<A: RenderApi + ?Sized>(api: &A, job_id: &str) {
    match api.cancel(job_id).await {
        Ok(()) => info!(job_id, "Cancelled render job"),
        Err(e) => warn!(job_id, error = %e, "Failed to cancel render job"),
    }
}
