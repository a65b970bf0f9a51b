//! The run context (E, spec §4.3).
//!
//! Aggregates the artifact store (A) and state machine (C): owns the
//! create/load/transition/fail/abort operations over a [`Run`], persisting
//! `run.json` after every mutation and appending to the audit log (B). A
//! terminal run is never mutated again; `fail` is idempotent when the run
//! is already failed.

use std::sync::Arc;

use chrono::Utc;

use crate::artifacts::{read_json, write_json, ArtifactStore};
use crate::audit::{self, AuditEntry};
use crate::domain::{NewRun, Result, Run, RunState, RunplaneError, StateHistoryEntry};
use crate::state_machine;

pub const RUN_ARTIFACT_NAME: &str = "run.json";

pub struct RunContext {
    store: Arc<dyn ArtifactStore>,
}

impl RunContext {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Create a new run, persist its initial `run.json`, and record a
    /// `run_created` audit entry.
    pub async fn create(&self, run_id: String, params: NewRun) -> Result<Run> {
        let tenant_id = params.tenant_id.clone();
        let run = Run::new(run_id.clone(), params);
        self.store.ensure_run(&run_id).await?;
        write_json(self.store.as_ref(), &run_id, RUN_ARTIFACT_NAME, &run).await?;
        audit::append(
            self.store.as_ref(),
            &run_id,
            AuditEntry::new(&run_id, "system", "run_created")
                .with_details(serde_json::json!({ "tenant_id": tenant_id, "state": run.state })),
        )
        .await?;
        Ok(run)
    }

    pub async fn load(&self, run_id: &str) -> Result<Run> {
        read_json(self.store.as_ref(), run_id, RUN_ARTIFACT_NAME)
            .await
            .map_err(|e| match e {
                RunplaneError::ArtifactNotFound { .. } => RunplaneError::RunNotFound(run_id.to_string()),
                other => other,
            })
    }

    async fn save(&self, run: &Run) -> Result<()> {
        write_json(self.store.as_ref(), &run.run_id, RUN_ARTIFACT_NAME, run).await
    }

    /// Validate and apply `to`, refusing to mutate a terminal run.
    pub async fn transition(&self, run_id: &str, to: RunState, actor: &str) -> Result<Run> {
        let mut run = self.load(run_id).await?;
        if run.state.is_terminal() {
            return Err(RunplaneError::InvalidTransition {
                run_id: run_id.to_string(),
                from: run.state.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        state_machine::validate(run_id, run.state, to)?;

        let from = run.state;
        let now = Utc::now();
        run.state = to;
        run.previous_states.push(StateHistoryEntry {
            state: to,
            entered_at: now,
        });
        run.updated_at = now;
        if to.is_terminal() {
            run.completed_at = Some(now);
            run.duration_ms = Some((now - run.created_at).num_milliseconds());
        }
        self.save(&run).await?;
        audit::append(
            self.store.as_ref(),
            run_id,
            AuditEntry::new(run_id, actor, "state_transition")
                .with_details(serde_json::json!({ "from": from, "to": to })),
        )
        .await?;
        Ok(run)
    }

    /// Move a run to `failed`, idempotent if already failed. Refuses any
    /// other terminal-to-terminal move.
    pub async fn fail(&self, run_id: &str, reason: &str, actor: &str) -> Result<Run> {
        let mut run = self.load(run_id).await?;
        if run.state == RunState::Failed {
            return Ok(run);
        }
        if run.state.is_terminal() {
            return Err(RunplaneError::InvalidTransition {
                run_id: run_id.to_string(),
                from: run.state.as_str().to_string(),
                to: RunState::Failed.as_str().to_string(),
            });
        }
        let now = Utc::now();
        run.state = RunState::Failed;
        run.previous_states.push(StateHistoryEntry {
            state: RunState::Failed,
            entered_at: now,
        });
        run.error = Some(reason.to_string());
        run.updated_at = now;
        run.completed_at = Some(now);
        run.duration_ms = Some((now - run.created_at).num_milliseconds());
        self.save(&run).await?;
        audit::append(
            self.store.as_ref(),
            run_id,
            AuditEntry::new(run_id, actor, "state_transition")
                .with_details(serde_json::json!({ "to": "failed", "reason": reason })),
        )
        .await?;
        Ok(run)
    }

    pub async fn abort(&self, run_id: &str, actor: &str) -> Result<Run> {
        self.transition(run_id, RunState::Aborted, actor).await
    }

    pub async fn audit_log(&self, run_id: &str) -> Result<Vec<AuditEntry>> {
        audit::read_all(self.store.as_ref(), run_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fs::FsArtifactStore;
    use crate::domain::RepoDescriptor;

    fn new_run_params(tenant: &str) -> NewRun {
        NewRun {
            repo: RepoDescriptor {
                owner: "acme".into(),
                name: "widget".into(),
                full_name: "acme/widget".into(),
                pr_url: None,
                base_ref: None,
                head_ref: None,
            },
            initiator: "webhook".into(),
            tenant_id: tenant.into(),
            capabilities_mode: None,
            models: None,
        }
    }

    async fn ctx() -> (tempfile::TempDir, RunContext) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
        (dir, RunContext::new(store))
    }

    #[tokio::test]
    async fn create_then_load_roundtrips_and_audits() {
        let (_dir, ctx) = ctx().await;
        let run = ctx.create("run-1".into(), new_run_params("tenant-a")).await.unwrap();
        assert_eq!(run.state, RunState::Queued);

        let loaded = ctx.load("run-1").await.unwrap();
        assert_eq!(loaded.run_id, "run-1");

        let log = ctx.audit_log("run-1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "run_created");
    }

    #[tokio::test]
    async fn load_missing_run_is_not_found() {
        let (_dir, ctx) = ctx().await;
        let err = ctx.load("nope").await.unwrap_err();
        assert!(matches!(err, RunplaneError::RunNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn transition_rejects_illegal_edge_and_keeps_state() {
        let (_dir, ctx) = ctx().await;
        ctx.create("run-1".into(), new_run_params("tenant-a")).await.unwrap();
        let err = ctx.transition("run-1", RunState::Done, "system").await.unwrap_err();
        assert!(matches!(err, RunplaneError::InvalidTransition { .. }));
        let run = ctx.load("run-1").await.unwrap();
        assert_eq!(run.state, RunState::Queued);
    }

    #[tokio::test]
    async fn terminal_run_is_never_mutated_again() {
        let (_dir, ctx) = ctx().await;
        ctx.create("run-1".into(), new_run_params("tenant-a")).await.unwrap();
        ctx.transition("run-1", RunState::Triaged, "system").await.unwrap();
        ctx.abort("run-1", "operator").await.unwrap();

        let err = ctx.transition("run-1", RunState::Planned, "system").await.unwrap_err();
        assert!(matches!(err, RunplaneError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn fail_is_idempotent_once_failed() {
        let (_dir, ctx) = ctx().await;
        ctx.create("run-1".into(), new_run_params("tenant-a")).await.unwrap();
        ctx.fail("run-1", "boom", "system").await.unwrap();
        let again = ctx.fail("run-1", "boom again", "system").await.unwrap();
        assert_eq!(again.error.as_deref(), Some("boom"));
    }
}
