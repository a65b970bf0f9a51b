//! The per-run audit log (B, spec §3.3).
//!
//! Appended as newline-delimited JSON to the `audit.log` artifact. Reads
//! return entries in append order. This is independent of the per-tenant
//! hash-chained security/billing log (L, [`runplane_store::hash_chain`]) —
//! the two logs serve different audiences and neither implies the other
//! (spec §9 design note).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactStore;
use crate::domain::Result;

pub const AUDIT_LOG_NAME: &str = "audit.log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(run_id: &str, actor: &str, action: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            actor_id: None,
            action: action.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Append one entry to `run_id`'s audit log, preserving append order.
pub async fn append(store: &dyn ArtifactStore, run_id: &str, entry: AuditEntry) -> Result<()> {
    let mut existing = if store.exists(run_id, AUDIT_LOG_NAME).await? {
        store.read(run_id, AUDIT_LOG_NAME).await?
    } else {
        Vec::new()
    };
    let mut line = serde_json::to_vec(&entry)?;
    line.push(b'\n');
    existing.extend_from_slice(&line);
    store.write(run_id, AUDIT_LOG_NAME, &existing).await
}

/// Read all entries for `run_id` in append order. Empty if the log doesn't
/// exist yet.
pub async fn read_all(store: &dyn ArtifactStore, run_id: &str) -> Result<Vec<AuditEntry>> {
    if !store.exists(run_id, AUDIT_LOG_NAME).await? {
        return Ok(Vec::new());
    }
    let bytes = store.read(run_id, AUDIT_LOG_NAME).await?;
    let text = String::from_utf8_lossy(&bytes);
    let mut entries = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fs::FsArtifactStore;

    #[tokio::test]
    async fn append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        append(&store, "run-1", AuditEntry::new("run-1", "system", "run_created"))
            .await
            .unwrap();
        append(
            &store,
            "run-1",
            AuditEntry::new("run-1", "system", "state_transition")
                .with_details(serde_json::json!({"to": "triaged"})),
        )
        .await
        .unwrap();

        let entries = read_all(&store, "run-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "run_created");
        assert_eq!(entries[1].action, "state_transition");
    }

    #[tokio::test]
    async fn read_all_on_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.ensure_run("run-1").await.unwrap();
        assert_eq!(read_all(&store, "run-1").await.unwrap(), Vec::new());
    }
}
