//! Recognized environment configuration (spec §6.5).
//!
//! Every key is read with a `RUNPLANE_` prefix and falls back to the
//! spec-documented default when unset or unparsable.

use std::time::Duration;

use crate::reliability::{CircuitBreakerConfig, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    DocumentStore,
}

impl StorageBackend {
    fn from_env(key: &str, default: Self) -> Self {
        match std::env::var(key).ok().as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("document-store") => StorageBackend::DocumentStore,
            _ => default,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        _ => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Fallback rate limit for actions with no per-action `rate_limit` of their
/// own (spec §4.7/§6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub default_max_per_window: u32,
    pub default_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_max_per_window: 60,
            default_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyTtlConfig {
    pub default_seconds: u64,
    pub min_seconds: u64,
    pub max_seconds: u64,
}

impl Default for IdempotencyTtlConfig {
    fn default() -> Self {
        Self {
            default_seconds: 86400,
            min_seconds: 60,
            max_seconds: 604800,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunplaneConfig {
    pub idempotency_backend: StorageBackend,
    pub metering_backend: StorageBackend,
    pub idempotency_ttl: IdempotencyTtlConfig,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub debug: bool,
    pub log_format_json: bool,
}

impl RunplaneConfig {
    /// Load configuration from the process environment, falling back to
    /// spec-documented defaults for anything unset.
    pub fn from_env() -> Self {
        let ttl = IdempotencyTtlConfig {
            default_seconds: env_u64("RUNPLANE_IDEMPOTENCY_DEFAULT_TTL_SECONDS", 86400),
            min_seconds: env_u64("RUNPLANE_IDEMPOTENCY_MIN_TTL_SECONDS", 60),
            max_seconds: env_u64("RUNPLANE_IDEMPOTENCY_MAX_TTL_SECONDS", 604800),
        };

        let retry = RetryPolicy {
            max_attempts: env_u32("RUNPLANE_RETRY_MAX_ATTEMPTS", 3).min(10),
            base_delay: Duration::from_millis(env_u64("RUNPLANE_RETRY_INITIAL_DELAY_MS", 200)),
            max_delay: Duration::from_millis(env_u64("RUNPLANE_RETRY_MAX_DELAY_MS", 10_000)),
            backoff_multiplier: env_f64("RUNPLANE_RETRY_BACKOFF_MULTIPLIER", 2.0),
        };

        let circuit_breaker = CircuitBreakerConfig {
            failure_threshold: env_u32("RUNPLANE_CIRCUIT_FAILURE_THRESHOLD", 5),
            half_open_success_threshold: env_u32("RUNPLANE_CIRCUIT_SUCCESS_THRESHOLD", 2),
            failure_window: Duration::from_millis(env_u64("RUNPLANE_CIRCUIT_FAILURE_WINDOW_MS", 60_000)),
            reset_timeout: Duration::from_millis(env_u64("RUNPLANE_CIRCUIT_RESET_TIMEOUT_MS", 30_000)),
        };

        let rate_limit = RateLimitConfig {
            default_max_per_window: env_u32("RUNPLANE_RATE_LIMIT_MAX_PER_WINDOW", 60),
            default_window: Duration::from_millis(env_u64("RUNPLANE_RATE_LIMIT_WINDOW_MS", 60_000)),
        };

        Self {
            idempotency_backend: StorageBackend::from_env("RUNPLANE_IDEMPOTENCY_BACKEND", StorageBackend::Memory),
            metering_backend: StorageBackend::from_env("RUNPLANE_METERING_BACKEND", StorageBackend::Memory),
            idempotency_ttl: ttl,
            retry,
            circuit_breaker,
            rate_limit,
            debug: env_bool("RUNPLANE_DEBUG", false),
            log_format_json: env_bool("RUNPLANE_LOG_FORMAT_JSON", false),
        }
    }
}

impl Default for RunplaneConfig {
    fn default() -> Self {
        Self {
            idempotency_backend: StorageBackend::Memory,
            metering_backend: StorageBackend::Memory,
            idempotency_ttl: IdempotencyTtlConfig::default(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            debug: false,
            log_format_json: false,
        }
    }
}
