//! The auto-action engine (O, spec §4.13): registers actions per tenant,
//! matches alerts against their triggers, and dispatches with rate-limit,
//! circuit-breaker, and retry protection borrowed from [`runplane_core::reliability`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use runplane_core::reliability::{retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, RateLimiter, RetryPolicy};
use runplane_core::{RateLimitConfig, RunplaneError};
use uuid::Uuid;

use crate::adapters::ActionAdapter;
use crate::audit::{ActionAuditEntry, ActionAuditLog};
use crate::model::{Action, ActionType, Alert, Execution, ExecutionState};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("action not found: {0}")]
    ActionNotFound(String),
    #[error("no adapter registered for action type {0:?}")]
    NoAdapter(ActionType),
}

pub struct ActionEngine {
    actions: Mutex<HashMap<String, Action>>,
    adapters: HashMap<ActionType, Arc<dyn ActionAdapter>>,
    rate_limiter: RateLimiter,
    default_rate_limit: (u32, Duration),
    circuit_breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    audit_log: Arc<dyn ActionAuditLog>,
}

impl ActionEngine {
    pub fn new(adapters: HashMap<ActionType, Arc<dyn ActionAdapter>>, audit_log: Arc<dyn ActionAuditLog>) -> Self {
        let default_rate_limit = RateLimitConfig::default();
        Self {
            actions: Mutex::new(HashMap::new()),
            adapters,
            rate_limiter: RateLimiter::new(default_rate_limit.default_max_per_window, default_rate_limit.default_window),
            default_rate_limit: (default_rate_limit.default_max_per_window, default_rate_limit.default_window),
            circuit_breakers: Mutex::new(HashMap::new()),
            audit_log,
        }
    }

    /// The `(max_per_window, window)` to enforce for `action`: its own
    /// `rate_limit` if set, otherwise this engine's default (spec §4.7).
    fn rate_limit_for(&self, action: &Action) -> (u32, Duration) {
        action
            .rate_limit
            .as_ref()
            .map(|r| (r.max_requests, Duration::from_millis(r.window_ms)))
            .unwrap_or(self.default_rate_limit)
    }

    pub fn register(&self, action: Action) {
        self.actions.lock().unwrap().insert(action.id.clone(), action);
    }

    pub fn list(&self, tenant_id: &str) -> Vec<Action> {
        self.actions
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn update(&self, action: Action) -> Result<(), EngineError> {
        let mut actions = self.actions.lock().unwrap();
        if !actions.contains_key(&action.id) {
            return Err(EngineError::ActionNotFound(action.id));
        }
        actions.insert(action.id.clone(), action);
        Ok(())
    }

    pub fn delete(&self, action_id: &str) -> Result<(), EngineError> {
        self.actions
            .lock()
            .unwrap()
            .remove(action_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::ActionNotFound(action_id.to_string()))
    }

    /// Enabled actions whose triggers match `trigger_type` against `alert`
    /// (spec §4.13).
    pub fn find_matching_actions(&self, alert: &Alert, trigger_type: &str) -> Vec<Action> {
        self.actions
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.enabled && a.triggers.iter().any(|t| t.matches(trigger_type, alert)))
            .cloned()
            .collect()
    }

    fn breaker_for(&self, action: &Action) -> Arc<CircuitBreaker> {
        let mut breakers = self.circuit_breakers.lock().unwrap();
        breakers
            .entry(action.id.clone())
            .or_insert_with(|| {
                let config = action
                    .circuit_breaker
                    .as_ref()
                    .map(|c| CircuitBreakerConfig {
                        failure_threshold: c.failure_threshold,
                        reset_timeout: Duration::from_millis(c.reset_timeout_ms),
                        ..CircuitBreakerConfig::default()
                    })
                    .unwrap_or_default();
                Arc::new(CircuitBreaker::new(config))
            })
            .clone()
    }

    /// Execute `action_id`, honoring rate limit and circuit breaker, and
    /// dispatching via its type's adapter. Always appends an audit entry
    /// (spec §4.13).
    pub async fn execute_action(
        &self,
        action_id: &str,
        alert: Option<&Alert>,
        trigger_type: &str,
        triggered_by: Option<&str>,
    ) -> Result<Execution, EngineError> {
        let action = self
            .actions
            .lock()
            .unwrap()
            .get(action_id)
            .cloned()
            .ok_or_else(|| EngineError::ActionNotFound(action_id.to_string()))?;

        let mut execution = Execution::new(
            Uuid::new_v4().to_string(),
            action.id.clone(),
            alert.map(|a| a.id.clone()),
            trigger_type.to_string(),
        );

        let now = Instant::now();
        let rate_resource = format!("action:{}", action.id);
        let (max_per_window, window) = self.rate_limit_for(&action);
        let rate_decision = self
            .rate_limiter
            .check_and_record_with_limit(&action.tenant_id, &rate_resource, max_per_window, window, now);
        if !rate_decision.allowed {
            execution.finish(ExecutionState::Skipped, None, Some("Rate limited".to_string()));
            self.audit(&execution, &action, triggered_by).await;
            return Ok(execution);
        }

        let breaker = self.breaker_for(&action);
        if !breaker.allow_call(now) {
            execution.finish(ExecutionState::Skipped, None, Some("Circuit breaker open".to_string()));
            self.audit(&execution, &action, triggered_by).await;
            return Ok(execution);
        }

        execution.state = ExecutionState::Running;

        let adapter = match self.adapters.get(&action.action_type) {
            Some(a) => a.clone(),
            None => {
                let err = EngineError::NoAdapter(action.action_type);
                execution.finish(ExecutionState::Failed, None, Some(err.to_string()));
                self.audit(&execution, &action, triggered_by).await;
                return Ok(execution);
            }
        };

        let policy = RetryPolicy {
            max_attempts: action.retry_config.as_ref().map(|r| r.max_attempts).unwrap_or(1).max(1),
            base_delay: action
                .retry_config
                .as_ref()
                .map(|r| Duration::from_millis(r.initial_delay_ms))
                .unwrap_or(RetryPolicy::default().base_delay),
            max_delay: RetryPolicy::default().max_delay,
            backoff_multiplier: action
                .retry_config
                .as_ref()
                .and_then(|r| r.backoff_multiplier)
                .unwrap_or(2.0),
        };

        let attempts = AtomicU32::new(0);
        let last_err: Mutex<Option<String>> = Mutex::new(None);

        // `retry_with_backoff` already applies jitter and the delay cap
        // (spec §4.7); every `AdapterError` is treated as transient here so
        // attempt-count semantics match the prior hand-rolled loop.
        let dispatch_result = retry_with_backoff(policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                adapter.dispatch(&action, alert).await.map_err(|err| {
                    *last_err.lock().unwrap() = Some(err.to_string());
                    RunplaneError::Contention(err.to_string())
                })
            }
        })
        .await;

        let total_attempts = attempts.load(Ordering::SeqCst);
        execution.retry_count = if dispatch_result.is_ok() {
            total_attempts.saturating_sub(1)
        } else {
            total_attempts
        };

        match dispatch_result {
            Ok(result) => {
                breaker.record_success(Instant::now());
                execution.finish(ExecutionState::Completed, Some(result), None);
            }
            Err(_) => {
                breaker.record_failure(Instant::now());
                execution.finish(ExecutionState::Failed, None, last_err.into_inner().unwrap());
            }
        }

        self.audit(&execution, &action, triggered_by).await;
        Ok(execution)
    }

    async fn audit(&self, execution: &Execution, action: &Action, triggered_by: Option<&str>) {
        self.audit_log
            .append(ActionAuditEntry {
                timestamp: execution.completed_at.unwrap_or(execution.started_at),
                action_id: action.id.clone(),
                execution_id: execution.id.clone(),
                tenant_id: action.tenant_id.clone(),
                trigger_type: execution.trigger_type.clone(),
                alert_id: execution.alert_id.clone(),
                state: execution.state,
                duration_ms: execution.duration_ms,
                error: execution.error.clone(),
                triggered_by: triggered_by.map(|s| s.to_string()),
            })
            .await;
    }

    /// Find and execute all matching actions, honoring each trigger's
    /// `delaySeconds` (spec §4.13). Delays run concurrently; ordering
    /// across different delays is not guaranteed, but each action's own
    /// delay is always honored before it dispatches (monotone per action).
    pub async fn process_alert(&self, alert: &Alert, trigger_type: &str) -> Vec<Execution> {
        let matches = self.find_matching_actions(alert, trigger_type);
        let futures = matches.into_iter().map(|action| {
            let delay = action
                .triggers
                .iter()
                .filter(|t| t.matches(trigger_type, alert))
                .filter_map(|t| t.delay_seconds)
                .max()
                .unwrap_or(0);
            async move {
                if delay > 0 {
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                self.execute_action(&action.id, Some(alert), trigger_type, None).await
            }
        });
        join_all(futures).await.into_iter().filter_map(Result::ok).collect()
    }
}
