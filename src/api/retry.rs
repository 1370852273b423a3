use crate::errors::ApiError;
use std::time::Duration;

/// Exponential backoff for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends of one call, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// Only transport failures and 5xx are retried, and never a call that was
    /// already resubmitted after a token refresh. `retry_count` is the number
    /// of retries already made.
    #[must_use]
    pub fn should_retry(&self, error: &ApiError, retry_count: u32, refreshed: bool) -> bool {
        if refreshed || retry_count.saturating_add(1) >= self.max_attempts {
            return false;
        }
        is_transient(error)
    }

    /// Delay before retry number `attempt` (1-based): `base × 2^(attempt−1)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[must_use]
pub const fn is_transient(error: &ApiError) -> bool {
    match error {
        ApiError::Network(_) | ApiError::Timeout(_) => true,
        ApiError::Http { status, .. } => *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ApiError {
        ApiError::from_response(status, "")
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay(3), Duration::from_millis(4_000));
    }

    #[test]
    fn only_transient_failures_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(&ApiError::Network("reset".into()), 0, false));
        assert!(policy.should_retry(&ApiError::Timeout("30s".into()), 1, false));
        assert!(policy.should_retry(&http(503), 0, false));

        for status in [400, 401, 403, 404, 422, 429] {
            assert!(!policy.should_retry(&http(status), 0, false), "{status}");
        }
        assert!(!policy.should_retry(&ApiError::AuthExpired, 0, false));
        assert!(!policy.should_retry(&ApiError::Decode("bad".into()), 0, false));
    }

    #[test]
    fn attempts_include_the_first_send() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&http(500), 0, false));
        assert!(policy.should_retry(&http(500), 1, false));
        assert!(!policy.should_retry(&http(500), 2, false));

        let single = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(10),
        };
        assert!(!single.should_retry(&http(500), 0, false));
        assert!(!policy.should_retry(&http(500), 0, true));
    }
}
