//! Three-state circuit breaker: closed -> open -> half-open -> closed
//! (spec §4.7). Grounded on the consecutive-failure-counter shape used
//! elsewhere in this workspace for tool-execution controls, generalized to
//! a full closed/open/half-open state machine with a failure window and a
//! half-open success threshold.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub reset_timeout: Duration,
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
            half_open_success_threshold: 2,
        }
    }
}

struct Inner {
    state: CircuitState,
    failures: Vec<Instant>,
    opened_at: Option<Instant>,
    half_open_successes: u32,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: Vec::new(),
                opened_at: None,
                half_open_successes: 0,
            }),
        }
    }

    /// Current state as of `now`, transitioning `open -> half_open` if the
    /// reset timeout has elapsed.
    pub fn state(&self, now: Instant) -> CircuitState {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.maybe_transition_to_half_open(&mut inner, now);
        inner.state
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner, now: Instant) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if now.duration_since(opened_at) >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                }
            }
        }
    }

    /// Whether a call may proceed right now.
    pub fn allow_call(&self, now: Instant) -> bool {
        !matches!(self.state(now), CircuitState::Open)
    }

    pub fn record_success(&self, now: Instant) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.maybe_transition_to_half_open(&mut inner, now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures.clear();
                    inner.opened_at = None;
                }
            }
            CircuitState::Closed => {
                inner.failures.clear();
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.maybe_transition_to_half_open(&mut inner, now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.failures.clear();
            }
            CircuitState::Closed => {
                inner.failures.retain(|&t| now.duration_since(t) < self.config.failure_window);
                inner.failures.push(now);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_secs(60),
            reset_timeout: Duration::from_millis(10),
            half_open_success_threshold: 2,
        }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new(config());
        let now = Instant::now();
        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(now), CircuitState::Closed);
        cb.record_failure(now);
        assert_eq!(cb.state(now), CircuitState::Open);
        assert!(!cb.allow_call(now));
    }

    #[test]
    fn transitions_to_half_open_after_reset_timeout() {
        let cb = CircuitBreaker::new(config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        assert_eq!(cb.state(now), CircuitState::Open);
        let later = now + Duration::from_millis(20);
        assert_eq!(cb.state(later), CircuitState::HalfOpen);
        assert!(cb.allow_call(later));
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new(config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let later = now + Duration::from_millis(20);
        assert_eq!(cb.state(later), CircuitState::HalfOpen);
        cb.record_failure(later);
        assert_eq!(cb.state(later), CircuitState::Open);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new(config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let later = now + Duration::from_millis(20);
        cb.record_success(later);
        assert_eq!(cb.state(later), CircuitState::HalfOpen);
        cb.record_success(later);
        assert_eq!(cb.state(later), CircuitState::Closed);
    }

    #[test]
    fn success_in_closed_state_clears_failure_count() {
        let cb = CircuitBreaker::new(config());
        let now = Instant::now();
        cb.record_failure(now);
        cb.record_failure(now);
        cb.record_success(now);
        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(now), CircuitState::Closed);
    }
}
