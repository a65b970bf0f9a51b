//! Idempotency store (F).
//!
//! Atomic check-and-set keyed by the SHA-256 hash of a caller-supplied key,
//! with a TTL-bounded `pending -> completed | failed` lifecycle and
//! collision detection when a key is replayed with a different payload.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{StorageError, StorageResult};

pub const DEFAULT_TTL_SECONDS: i64 = 86_400;
pub const MIN_TTL_SECONDS: i64 = 60;
pub const MAX_TTL_SECONDS: i64 = 604_800;

/// Clamp a caller-supplied TTL into `[MIN_TTL_SECONDS, MAX_TTL_SECONDS]`.
pub fn normalize_ttl(ttl_seconds: Option<i64>) -> i64 {
    ttl_seconds
        .unwrap_or(DEFAULT_TTL_SECONDS)
        .clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS)
}

/// SHA-256 hex digest of an idempotency key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key_hash: String,
    pub key: String,
    pub tenant_id: String,
    pub status: IdempotencyStatus,
    pub run_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub payload_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of `check_and_set`.
#[derive(Debug, Clone)]
pub struct CheckAndSetOutcome {
    pub is_new: bool,
    pub record: IdempotencyRecord,
}

/// Idempotency store.
///
/// Guarantees (property 4, §8): `check_and_set` called N times concurrently
/// with the same key and payload hash yields exactly one `is_new = true`
/// and N-1 `is_new = false`, all observing the same record. A call with a
/// differing `payload_hash` against a live (non-expired) record fails with
/// `StorageError::IdempotencyCollision`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomic check-and-set. Creates a `pending` record if none exists (or
    /// the existing one has expired); otherwise returns the existing record.
    async fn check_and_set(
        &self,
        key: &str,
        tenant_id: &str,
        ttl_seconds: Option<i64>,
        payload_hash: Option<&str>,
    ) -> StorageResult<CheckAndSetOutcome>;

    /// Mark a pending record completed with an optional result payload.
    async fn complete(
        &self,
        key_hash: &str,
        run_id: &str,
        result: Option<serde_json::Value>,
    ) -> StorageResult<()>;

    /// Mark a pending record failed. The error message is stored as the
    /// result payload so a retried caller can see why the prior attempt
    /// failed.
    async fn fail(&self, key_hash: &str, error: &str) -> StorageResult<()>;

    /// Look up a record by raw key.
    async fn get(&self, key: &str) -> StorageResult<Option<IdempotencyRecord>>;

    /// Whether a non-expired record exists for the given key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Remove expired records, returning the count removed. `batch` bounds
    /// how many records are scanned in one call.
    async fn cleanup(&self, batch: Option<usize>) -> StorageResult<usize>;
}

pub fn expires_at(created_at: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    created_at + Duration::seconds(ttl_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_normalization_clamps_bounds() {
        assert_eq!(normalize_ttl(Some(1)), MIN_TTL_SECONDS);
        assert_eq!(normalize_ttl(Some(i64::MAX)), MAX_TTL_SECONDS);
        assert_eq!(normalize_ttl(None), DEFAULT_TTL_SECONDS);
        assert_eq!(normalize_ttl(Some(3600)), 3600);
    }

    #[test]
    fn hash_key_is_deterministic() {
        assert_eq!(hash_key("create:run:X"), hash_key("create:run:X"));
        assert_ne!(hash_key("create:run:X"), hash_key("create:run:Y"));
        assert_eq!(hash_key("create:run:X").len(), 64);
    }
}
