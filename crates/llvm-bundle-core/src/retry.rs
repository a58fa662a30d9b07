//! Bounded retry with a fixed interval.
//!
//! Only small listing/registration calls go through here. Large downloads
//! and uploads are never retried blindly; resuming from the cache is cheaper.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retries allowed after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Sleep between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Fixed-interval retry policy. No jitter, no exponential growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Sleep between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            interval: Duration::ZERO,
        }
    }
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable: Sized {
    /// True for network failures and server-side (5xx) errors.
    fn is_transient(&self) -> bool;

    /// Wrap the last error once the retry budget is spent.
    fn exhausted(self, operation: &str, retries: u32) -> Self;
}

/// Run `attempt` until it succeeds, fails fatally, or exceeds the policy.
///
/// Non-transient errors are returned immediately; deterministic failures
/// such as rejected requests would only fail again.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error
/// wrapped by [`Retryable::exhausted`].
pub async fn with_retries<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                retries += 1;
                if retries > policy.max_retries {
                    return Err(err.exhausted(operation, policy.max_retries));
                }
                warn!(operation, retry = retries, error = %err, "transient failure, retrying");
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Flaky,
        Broken,
        GaveUp(u32),
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Flaky)
        }

        fn exhausted(self, _operation: &str, retries: u32) -> Self {
            Self::GaveUp(retries)
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&RetryPolicy::immediate(3), "list", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError::Flaky)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(&RetryPolicy::immediate(3), "list", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Broken) }
        })
        .await;

        assert_eq!(result, Err(TestError::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(&RetryPolicy::immediate(3), "list", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Flaky) }
        })
        .await;

        assert_eq!(result, Err(TestError::GaveUp(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.interval, Duration::from_secs(10));
    }
}
