//! Error taxonomy for the run control plane (spec §7).
//!
//! One enum per kind rather than a single flat type, so callers can match
//! on *kind* and decide whether to retry, surface to the caller, or abort.
//! Transient errors are retried by [`crate::reliability::retry`] and should
//! not normally reach a caller directly; the rest surface synchronously.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunplaneError>;

#[derive(Error, Debug)]
pub enum RunplaneError {
    // --- Validation ---
    #[error("invalid state transition: {from} -> {to} for run {run_id}")]
    InvalidTransition {
        run_id: String,
        from: String,
        to: String,
    },

    #[error("invalid adjustment {0}: must be in [-2, 2]")]
    InvalidAdjustment(i32),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    // --- Conflict ---
    #[error("idempotency payload collision for key hash {key_hash}")]
    IdempotencyCollision { key_hash: String },

    #[error("approval denied: {0}")]
    ApprovalDenied(String),

    #[error("patch hash mismatch: approval={approval}, provided={provided}")]
    PatchMismatch { approval: String, provided: String },

    // --- Resource ---
    #[error("rate limited on {resource} for tenant {tenant_id}, retry after {retry_after_seconds}s")]
    RateLimited {
        tenant_id: String,
        resource: String,
        retry_after_seconds: u64,
    },

    #[error("quota exceeded for {resource}: {current}/{limit}")]
    QuotaExceeded {
        resource: String,
        current: u64,
        limit: u64,
    },

    #[error("circuit open for {resource}, retry after {retry_after_ms}ms")]
    CircuitOpen { resource: String, retry_after_ms: u64 },

    // --- Transient ---
    #[error("transport timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("store contention, retry: {0}")]
    Contention(String),

    // --- Integrity ---
    #[error("hash chain integrity violation at sequence {sequence}: {detail}")]
    ChainIntegrity { sequence: u64, detail: String },

    #[error("artifact hash mismatch for {name}: expected {expected}, computed {computed}")]
    ArtifactHashMismatch {
        name: String,
        expected: String,
        computed: String,
    },

    // --- Not-found ---
    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("artifact not found: {run_id}/{name}")]
    ArtifactNotFound { run_id: String, name: String },

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("check not found: {0}")]
    CheckNotFound(String),

    // --- Fatal ---
    #[error("misconfiguration: {0}")]
    Misconfigured(String),

    #[error("corrupted artifact {name}: {detail}")]
    CorruptedArtifact { name: String, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] runplane_store::StorageError),
}

impl RunplaneError {
    /// Whether a retry loop (§4.7, §7) should ever retry this error kind.
    /// Transient errors are retryable; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunplaneError::Timeout { .. }
                | RunplaneError::Contention(_)
                | RunplaneError::RateLimited { .. }
                | RunplaneError::CircuitOpen { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_the_edge() {
        let err = RunplaneError::InvalidTransition {
            run_id: "r1".into(),
            from: "queued".into(),
            to: "done".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("queued"));
        assert!(msg.contains("done"));
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(RunplaneError::Timeout { elapsed_ms: 10 }.is_retryable());
        assert!(!RunplaneError::RunNotFound("x".into()).is_retryable());
        assert!(!RunplaneError::InvalidAdjustment(5).is_retryable());
    }
}
