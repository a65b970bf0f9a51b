use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use runplane_actions::{
    Action, ActionAdapter, ActionEngine, ActionType, Alert, ExecutionState, MemoryActionAuditLog,
    Severity, Trigger,
};

struct CountingAdapter {
    calls: std::sync::atomic::AtomicU32,
    fail_first_n: u32,
}

#[async_trait]
impl ActionAdapter for CountingAdapter {
    async fn dispatch(
        &self,
        _action: &Action,
        _alert: Option<&Alert>,
    ) -> Result<serde_json::Value, runplane_actions::AdapterError> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n < self.fail_first_n {
            return Err(runplane_actions::AdapterError::DispatchFailed {
                action_id: "a".to_string(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(serde_json::json!({"ok": true}))
    }
}

fn alert(rule: &str) -> Alert {
    Alert {
        id: "alert-1".to_string(),
        severity: Severity::High,
        rule: rule.to_string(),
        labels: BTreeMap::new(),
    }
}

fn webhook_action(id: &str, retry_attempts: u32) -> Action {
    Action {
        id: id.to_string(),
        tenant_id: "tenant-a".to_string(),
        action_type: ActionType::Webhook,
        config: serde_json::json!({}),
        triggers: vec![Trigger {
            trigger_type: "gate_failed".to_string(),
            severity_filter: None,
            rule_filter: Some("coverage_drop".to_string()),
            label_filter: None,
            delay_seconds: None,
        }],
        rate_limit: None,
        circuit_breaker: None,
        retry_config: Some(runplane_actions::RetryConfig {
            max_attempts: retry_attempts,
            initial_delay_ms: 1,
            backoff_multiplier: None,
        }),
        enabled: true,
    }
}

#[tokio::test]
async fn matching_action_executes_and_retries_until_success() {
    let mut adapters: HashMap<ActionType, Arc<dyn ActionAdapter>> = HashMap::new();
    let adapter = Arc::new(CountingAdapter {
        calls: std::sync::atomic::AtomicU32::new(0),
        fail_first_n: 2,
    });
    adapters.insert(ActionType::Webhook, adapter.clone());
    let audit = Arc::new(MemoryActionAuditLog::new());
    let engine = ActionEngine::new(adapters, audit.clone());

    engine.register(webhook_action("action-1", 3));

    let executions = engine.process_alert(&alert("coverage_drop"), "gate_failed").await;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].state, ExecutionState::Completed);
    assert_eq!(executions[0].retry_count, 2);

    let entries = audit.for_action("action-1").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tenant_id, "tenant-a");
}

#[tokio::test]
async fn non_matching_alert_executes_nothing() {
    let adapters: HashMap<ActionType, Arc<dyn ActionAdapter>> = HashMap::new();
    let audit = Arc::new(MemoryActionAuditLog::new());
    let engine = ActionEngine::new(adapters, audit);

    engine.register(webhook_action("action-1", 1));
    let executions = engine.process_alert(&alert("unrelated_rule"), "gate_failed").await;
    assert!(executions.is_empty());
}

#[tokio::test]
async fn exhausting_retries_reports_failed() {
    let mut adapters: HashMap<ActionType, Arc<dyn ActionAdapter>> = HashMap::new();
    adapters.insert(
        ActionType::Webhook,
        Arc::new(CountingAdapter {
            calls: std::sync::atomic::AtomicU32::new(0),
            fail_first_n: 10,
        }),
    );
    let audit = Arc::new(MemoryActionAuditLog::new());
    let engine = ActionEngine::new(adapters, audit);
    engine.register(webhook_action("action-1", 2));

    let executions = engine.process_alert(&alert("coverage_drop"), "gate_failed").await;
    assert_eq!(executions[0].state, ExecutionState::Failed);
    assert_eq!(executions[0].error.as_deref(), Some("simulated failure"));
}

#[tokio::test]
async fn per_action_rate_limit_is_enforced_independently_of_the_default() {
    let mut adapters: HashMap<ActionType, Arc<dyn ActionAdapter>> = HashMap::new();
    adapters.insert(
        ActionType::Webhook,
        Arc::new(CountingAdapter {
            calls: std::sync::atomic::AtomicU32::new(0),
            fail_first_n: 0,
        }),
    );
    let audit = Arc::new(MemoryActionAuditLog::new());
    let engine = ActionEngine::new(adapters, audit);

    let mut action = webhook_action("action-1", 1);
    action.rate_limit = Some(runplane_actions::RateLimitSpec {
        max_requests: 1,
        window_ms: 60_000,
    });
    engine.register(action);

    let first = engine.execute_action("action-1", None, "gate_failed", None).await.unwrap();
    assert_eq!(first.state, ExecutionState::Completed);

    let second = engine.execute_action("action-1", None, "gate_failed", None).await.unwrap();
    assert_eq!(second.state, ExecutionState::Skipped);
    assert_eq!(second.error.as_deref(), Some("Rate limited"));
}

#[tokio::test]
async fn disabled_action_is_not_matched() {
    let adapters: HashMap<ActionType, Arc<dyn ActionAdapter>> = HashMap::new();
    let audit = Arc::new(MemoryActionAuditLog::new());
    let engine = ActionEngine::new(adapters, audit);

    let mut action = webhook_action("action-1", 1);
    action.enabled = false;
    engine.register(action);

    let matches = engine.find_matching_actions(&alert("coverage_drop"), "gate_failed");
    assert!(matches.is_empty());
}
