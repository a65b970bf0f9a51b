//! Sliding-window rate limiter, keyed by `(tenant_id, resource)` (spec §4.7).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_seconds: u64,
}

struct Window {
    hits: VecDeque<Instant>,
}

pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    state: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `(tenant_id, resource)` at `now` against this
    /// limiter's own `(max_per_window, window)`, returning whether it's
    /// allowed under the sliding window.
    pub fn check_and_record(&self, tenant_id: &str, resource: &str, now: Instant) -> RateLimitDecision {
        self.check_and_record_with_limit(tenant_id, resource, self.max_per_window, self.window, now)
    }

    /// Same as [`Self::check_and_record`], but against a caller-supplied
    /// `(max_per_window, window)` instead of this limiter's own default —
    /// lets one `RateLimiter` enforce a different limit per action/resource
    /// (spec §4.7/§6.5) while still sharing its sliding-window state.
    pub fn check_and_record_with_limit(
        &self,
        tenant_id: &str,
        resource: &str,
        max_per_window: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let key = (tenant_id.to_string(), resource.to_string());
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let entry = state.entry(key).or_insert_with(|| Window { hits: VecDeque::new() });

        while let Some(&front) = entry.hits.front() {
            if now.duration_since(front) >= window {
                entry.hits.pop_front();
            } else {
                break;
            }
        }

        if entry.hits.len() as u32 >= max_per_window {
            let oldest = *entry.hits.front().expect("non-empty when at capacity");
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return RateLimitDecision {
                allowed: false,
                retry_after_seconds: retry_after.as_secs().max(1),
            };
        }

        entry.hits.push_back(now);
        RateLimitDecision {
            allowed: true,
            retry_after_seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_and_record("t1", "pr_create", now).allowed);
        assert!(limiter.check_and_record("t1", "pr_create", now).allowed);
        let decision = limiter.check_and_record("t1", "pr_create", now);
        assert!(!decision.allowed);
        assert!(decision.retry_after_seconds >= 1);
    }

    #[test]
    fn window_slides_independently_per_tenant_and_resource() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_and_record("t1", "pr_create", now).allowed);
        assert!(limiter.check_and_record("t2", "pr_create", now).allowed);
        assert!(limiter.check_and_record("t1", "git_push", now).allowed);
    }

    #[test]
    fn per_call_limit_overrides_the_instance_default() {
        let limiter = RateLimiter::new(1000, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter
            .check_and_record_with_limit("t1", "pr_create", 1, Duration::from_secs(60), now)
            .allowed);
        let decision = limiter.check_and_record_with_limit("t1", "pr_create", 1, Duration::from_secs(60), now);
        assert!(!decision.allowed);
        // The shared instance default is untouched by the per-call override.
        assert!(limiter.check_and_record("t1", "other_resource", now).allowed);
    }

    #[test]
    fn old_hits_expire_out_of_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        let now = Instant::now();
        assert!(limiter.check_and_record("t1", "pr_create", now).allowed);
        let later = now + Duration::from_millis(20);
        assert!(limiter.check_and_record("t1", "pr_create", later).allowed);
    }
}
