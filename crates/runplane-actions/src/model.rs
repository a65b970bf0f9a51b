//! Action, trigger, execution, and alert data model (spec §3.10).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub rule: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Webhook,
    Email,
    Slack,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub severity_filter: Option<Vec<Severity>>,
    pub rule_filter: Option<String>,
    pub label_filter: Option<BTreeMap<String, String>>,
    pub delay_seconds: Option<u64>,
}

impl Trigger {
    /// All specified filters must pass (spec §4.13); an absent filter
    /// always passes.
    pub fn matches(&self, trigger_type: &str, alert: &Alert) -> bool {
        if self.trigger_type != trigger_type {
            return false;
        }
        if let Some(severities) = &self.severity_filter {
            if !severities.contains(&alert.severity) {
                return false;
            }
        }
        if let Some(rule) = &self.rule_filter {
            if rule != &alert.rule {
                return false;
            }
        }
        if let Some(labels) = &self.label_filter {
            for (key, value) in labels {
                if alert.labels.get(key) != Some(value) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub max_requests: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSpec {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Growth factor per attempt; defaults to classic binary backoff when
    /// unset (spec §4.7/§6.5's `backoffMultiplier`).
    #[serde(default)]
    pub backoff_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub config: serde_json::Value,
    pub triggers: Vec<Trigger>,
    pub rate_limit: Option<RateLimitSpec>,
    pub circuit_breaker: Option<CircuitBreakerSpec>,
    pub retry_config: Option<RetryConfig>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub action_id: String,
    pub alert_id: Option<String>,
    pub trigger_type: String,
    pub state: ExecutionState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl Execution {
    pub fn new(id: String, action_id: String, alert_id: Option<String>, trigger_type: String) -> Self {
        Self {
            id,
            action_id,
            alert_id,
            trigger_type,
            state: ExecutionState::Pending,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            result: None,
            error: None,
            retry_count: 0,
        }
    }

    pub fn finish(&mut self, state: ExecutionState, result: Option<serde_json::Value>, error: Option<String>) {
        let now = Utc::now();
        self.state = state;
        self.result = result;
        self.error = error;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
    }
}
