//! Error taxonomy for the storage layer.
//!
//! Mirrors the kinds from the control plane's error taxonomy (Conflict,
//! Resource, Transient, Integrity, Not-found, Fatal) rather than one flat
//! enum, so callers can match on *kind* and decide whether to retry,
//! surface to the caller, or abort.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    // --- Not-found ---
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: String },

    #[error("action not found: {action_id}")]
    ActionNotFound { action_id: String },

    #[error("idempotency record not found for key hash {key_hash}")]
    IdempotencyNotFound { key_hash: String },

    // --- Conflict ---
    #[error("idempotency payload collision for key hash {key_hash}: stored payload hash {stored} does not match {provided}")]
    IdempotencyCollision {
        key_hash: String,
        stored: String,
        provided: String,
    },

    #[error("invalid run state for {run_id}: was {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    #[error("tenant {tenant_id} cannot transition from {from} to {to}")]
    InvalidTenantTransition {
        tenant_id: String,
        from: String,
        to: String,
    },

    #[error("plan downgrade refused for {tenant_id}: {reason}")]
    PlanDowngradeRefused { tenant_id: String, reason: String },

    #[error("hard delete refused for {tenant_id}: confirmation token mismatch")]
    ConfirmTokenMismatch { tenant_id: String },

    // --- Resource ---
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("quota exceeded for {resource}: {current}/{limit}")]
    QuotaExceeded {
        resource: String,
        current: u64,
        limit: u64,
    },

    // --- Transient ---
    #[error("store contention, retry: {0}")]
    Contention(String),

    #[error("backend timeout: {0}")]
    Timeout(String),

    // --- Integrity ---
    #[error("digest is not valid sha-256 hex: {digest}")]
    InvalidDigest { digest: String },

    #[error("chain integrity violation for tenant {tenant_id} at sequence {sequence}: {detail}")]
    ChainIntegrity {
        tenant_id: String,
        sequence: u64,
        detail: String,
    },

    // --- Fatal ---
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
