use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// One retry after a short pause. Used for outbound calls to third parties.
    pub fn single_retry() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(250),
            ..Self::default()
        }
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Failure of an outbound HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum HttpCallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl HttpCallError {
    /// Timeouts, connection failures, 5xx and 429 may succeed on a second try.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Decode(_) => false,
        }
    }
}

/// Retries only transient HTTP failures.
pub struct TransientHttpPolicy;

impl RetryPolicy<HttpCallError> for TransientHttpPolicy {
    fn is_retryable(&self, error: &HttpCallError) -> bool {
        error.is_transient()
    }
}

/// Execute an async function with retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    policy: impl RetryPolicy<E>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(attempts, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !policy.is_retryable(&error) {
                    warn!(attempts, error = %error, "Operation failed");
                    return Err(error);
                }

                warn!(attempts, error = %error, delay = ?delay, "Attempt failed, retrying");

                sleep(delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn transient_status_is_retried_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), HttpCallError> = with_retry(&fast(2), TransientHttpPolicy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HttpCallError::Status {
                status: 503,
                body: String::new(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), HttpCallError> = with_retry(&fast(5), TransientHttpPolicy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HttpCallError::Status {
                status: 400,
                body: "bad".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_failure_is_returned() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(2), TransientHttpPolicy, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HttpCallError::Status {
                    status: 429,
                    body: String::new(),
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn status_classification() {
        let transient = |status| HttpCallError::Status {
            status,
            body: String::new(),
        }
        .is_transient();
        assert!(transient(500));
        assert!(transient(429));
        assert!(!transient(404));
        assert!(!HttpCallError::Decode("x".into()).is_transient());
    }
}
