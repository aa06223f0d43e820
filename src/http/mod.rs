// Shared blocking HTTP plumbing for the provider clients


use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Failure of a single logical HTTP request after retries
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl HttpError {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            Self::Transport(_) => None,
        }
    }
}

/// Retry policy for idempotent provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(attempts: u32, backoff_base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_base,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
    }
}

/// Build a `ureq` agent with a global timeout and optional user agent
#[inline]
pub fn build_agent(timeout: Duration, user_agent: Option<&str>) -> ureq::Agent {
    let mut builder = ureq::Agent::config_builder().timeout_global(Some(timeout));
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder.build().into()
}

/// Run `request_fn` until it succeeds, retrying server and transport errors.
///
/// Client errors (4xx) are returned immediately with their status code so
/// callers can treat specific statuses (e.g. 409) as outcomes.
#[inline]
pub fn send_with_retry<F>(policy: RetryPolicy, target: &str, mut request_fn: F) -> Result<String, HttpError>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        debug!("HTTP request attempt {}/{} to {}", attempt, policy.attempts, target);

        let error = match request_fn() {
            Ok(body) => return Ok(body),
            Err(error) => error,
        };

        let retryable = match &error {
            ureq::Error::StatusCode(status) if *status >= 500 || *status == 429 => {
                warn!(
                    "Server error (status {}) from {}, attempt {}/{}",
                    status, target, attempt, policy.attempts
                );
                true
            }
            ureq::Error::StatusCode(status) => {
                debug!("Client error (status {}) from {}, not retrying", status, target);
                return Err(HttpError::Status(*status));
            }
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => {
                warn!(
                    "Transport error from {}: {}, attempt {}/{}",
                    target, error, attempt, policy.attempts
                );
                true
            }
            _ => false,
        };

        if !retryable {
            return Err(HttpError::Transport(error.to_string()));
        }

        last_error = Some(match error {
            ureq::Error::StatusCode(status) => HttpError::Status(status),
            other => HttpError::Transport(other.to_string()),
        });

        if attempt < policy.attempts {
            let delay = policy.delay_after(attempt);
            debug!("Waiting {:?} before retry", delay);
            std::thread::sleep(delay);
        }
    }

    error!("All retry attempts failed for request to {}", target);
    Err(last_error.unwrap_or_else(|| HttpError::Transport("request failed after retries".to_string())))
}

/// Run a blocking closure off the async executor
#[inline]
pub async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("Blocking task failed: {}", e))?
}
