//! Retry with capped exponential backoff and equal jitter (spec §4.7).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::domain::RunplaneError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor applied per attempt (spec §4.7/§6.5's
    /// `backoffMultiplier`); `2.0` reproduces classic binary exponential
    /// backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-indexed, the attempt that just
    /// failed), capped exponential with equal jitter: half the capped
    /// exponential value is fixed, the other half is uniform random.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(64) as i32);
        let exp = (self.base_delay.as_millis() as f64) * factor;
        let capped = exp.min(self.max_delay.as_millis() as f64) as u64;
        let half = capped / 2;
        let jitter = if half == 0 { 0 } else { rand::thread_rng().gen_range(0..=half) };
        Duration::from_millis(half + jitter)
    }
}

/// Run `f` up to `policy.max_attempts` times, sleeping between attempts per
/// [`RetryPolicy::delay_for_attempt`], stopping early on a non-retryable
/// error (spec §7's `is_retryable` classification).
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut f: F) -> Result<T, RunplaneError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RunplaneError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && err.is_retryable() => {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RunplaneError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        };
        let result: Result<(), _> = retry_with_backoff(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RunplaneError::Contention("busy".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RunplaneError::MalformedInput("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        };
        for attempt in 1..=10 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(500));
        }
    }

    #[test]
    fn multiplier_of_one_never_grows_past_base_delay() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
        };
        for attempt in 1..=5 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn higher_multiplier_hits_the_cap_sooner() {
        let fast = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 10.0,
        };
        // attempt 2: 100 * 10^2 = 10_000ms, capped to 500ms either way.
        assert!(fast.delay_for_attempt(2) <= Duration::from_millis(500));
    }
}
