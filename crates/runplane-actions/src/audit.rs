//! Per-execution audit trail the engine emits on every dispatch attempt
//! (spec §4.13): `{timestamp, actionId, executionId, tenantId, triggerType,
//! alertId?, state, durationMs?, error?, triggeredBy?}`.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ExecutionState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action_id: String,
    pub execution_id: String,
    pub tenant_id: String,
    pub trigger_type: String,
    pub alert_id: Option<String>,
    pub state: ExecutionState,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub triggered_by: Option<String>,
}

#[async_trait]
pub trait ActionAuditLog: Send + Sync {
    async fn append(&self, entry: ActionAuditEntry);
    async fn for_action(&self, action_id: &str) -> Vec<ActionAuditEntry>;
}

#[derive(Default)]
pub struct MemoryActionAuditLog {
    entries: Mutex<Vec<ActionAuditEntry>>,
}

impl MemoryActionAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionAuditLog for MemoryActionAuditLog {
    async fn append(&self, entry: ActionAuditEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    async fn for_action(&self, action_id: &str) -> Vec<ActionAuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.action_id == action_id)
            .cloned()
            .collect()
    }
}
