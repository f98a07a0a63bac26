//! Caller-level retry around an invocation.
//!
//! Every failure kind is retried the same way; the last failure is surfaced
//! unchanged once attempts run out.

use std::{future::Future, time::Duration};

use crate::{error::ProviderError, invoke::InvocationResult};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    /// Delay after attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_step: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// What a retried call ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub result: Result<String, ProviderError>,
    /// Attempts actually made.
    pub attempts: u32,
    /// Failures of the attempts before the final one.
    pub failures: Vec<ProviderError>,
}

impl RetryReport {
    pub fn into_result(self) -> Result<String, ProviderError> {
        self.result
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// The operation receives the 1-indexed attempt number.
pub async fn retry<F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = InvocationResult>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = Vec::new();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(text) => {
                return RetryReport {
                    result: Ok(text),
                    attempts: attempt,
                    failures,
                };
            }
            Err(err) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!("Retry attempt {} after error: {}", attempt, err);
                failures.push(err);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(err) => {
                return RetryReport {
                    result: Err(err),
                    attempts: attempt,
                    failures,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let report = retry(&fast(), |attempt| async move {
            if attempt < 3 {
                Err(ProviderError::new(ErrorKind::Unavailable, format!("try {}", attempt)))
            } else {
                Ok("done".to_string())
            }
        })
        .await;

        assert_eq!(report.result, Ok("done".to_string()));
        assert_eq!(report.attempts, 3);
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_last_failure_surfaced() {
        let calls = AtomicU32::new(0);
        let report = retry(&fast(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(ProviderError::new(
                    if attempt == 3 { ErrorKind::Auth } else { ErrorKind::Timeout },
                    format!("attempt {}", attempt),
                ))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(err.message, "attempt 3");
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let report = retry(&RetryPolicy::no_retry(), |_| async {
            Err(ProviderError::new(ErrorKind::Unknown, "nope"))
        })
        .await;
        assert_eq!(report.attempts, 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::default();
        let _ = retry(&policy, |_| async {
            Err(ProviderError::new(ErrorKind::Unavailable, "down"))
        })
        .await;
        // 1s after the first attempt, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
    }
}
