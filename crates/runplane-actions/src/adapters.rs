//! Type-specific dispatch adapters (spec §4.13: "dispatches to the
//! type-specific adapter"). No concrete webhook/email/Slack client is
//! wired in here — providers are external collaborators per the system's
//! scope — but the `Log` adapter gives the engine something runnable out
//! of the box, and tests exercise a fake adapter.

use async_trait::async_trait;

use crate::model::{Action, Alert};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("adapter for action {action_id} failed: {message}")]
    DispatchFailed { action_id: String, message: String },
}

#[async_trait]
pub trait ActionAdapter: Send + Sync {
    async fn dispatch(&self, action: &Action, alert: Option<&Alert>) -> Result<serde_json::Value, AdapterError>;
}

/// Logs the dispatch via `tracing` and always succeeds. Useful as a
/// default for the `log` action type and in tests.
pub struct LogAdapter;

#[async_trait]
impl ActionAdapter for LogAdapter {
    async fn dispatch(&self, action: &Action, alert: Option<&Alert>) -> Result<serde_json::Value, AdapterError> {
        tracing::info!(
            action_id = %action.id,
            alert_id = alert.map(|a| a.id.as_str()).unwrap_or("-"),
            "dispatching log action",
        );
        Ok(serde_json::json!({ "dispatched": true }))
    }
}
