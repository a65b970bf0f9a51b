//! Structured observability hooks for run lifecycle events (J, spec §4.9).
//!
//! This module provides:
//! - Run-scoped tracing spans via [`RunSpan`], carrying `run_id` and
//!   `tenant_id` as task-local trace context so every event emitted while
//!   the span is entered is automatically correlated.
//! - Emission functions for the lifecycle events spec §4.9 names:
//!   `run_created`, `state_transition`, `artifact_written`,
//!   `gate_evaluated`, `circuit_tripped`.
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`). For
//! JSON output, pass `json = true` to [`crate::telemetry::init_tracing`].

use tracing::info;

/// RAII guard that enters a run-scoped tracing span for the duration of a
/// run, carrying `run_id` and `tenant_id` as trace context.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with `run_id` and `tenant_id`.
    pub fn enter(run_id: &str, tenant_id: &str) -> Self {
        let span = tracing::info_span!("runplane.run", run_id = %run_id, tenant_id = %tenant_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a new run was created.
pub fn emit_run_created(run_id: &str, tenant_id: &str, repo_full_name: &str) {
    info!(
        event = "run_created",
        run_id = %run_id,
        tenant_id = %tenant_id,
        repo = %repo_full_name,
    );
}

/// Emit event: a run's state changed.
pub fn emit_state_transition(run_id: &str, from: &str, to: &str) {
    info!(event = "state_transition", run_id = %run_id, from = %from, to = %to);
}

/// Emit event: an artifact was written to a run's bundle.
pub fn emit_artifact_written(run_id: &str, name: &str, hash: &str) {
    info!(event = "artifact_written", run_id = %run_id, name = %name, hash = %hash);
}

/// Emit event: a readiness or merge gate finished evaluating.
pub fn emit_gate_evaluated(run_id: &str, gate: &str, passed: bool) {
    info!(event = "gate_evaluated", run_id = %run_id, gate = %gate, passed = passed);
}

/// Emit event: a circuit breaker tripped open (warning level).
pub fn emit_circuit_tripped(resource: &str, consecutive_failures: u32) {
    tracing::warn!(
        event = "circuit_tripped",
        resource = %resource,
        consecutive_failures = consecutive_failures,
    );
}

/// Emit event: run finalization error (warning level).
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run_finalize_error", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_enter_does_not_panic() {
        let _span = RunSpan::enter("run-1", "tenant-a");
        emit_run_created("run-1", "tenant-a", "acme/widget");
    }
}
