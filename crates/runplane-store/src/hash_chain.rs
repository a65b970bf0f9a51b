//! Storage side of the hash-chained security/billing audit log (L).
//!
//! Holds the per-tenant append-only chain of entries. The verification
//! algorithm itself (recomputing and comparing hashes, detecting gaps and
//! chain breaks) is a pure function over the entries this store returns,
//! and lives in `runplane-core` so it can run against bytes pulled from any
//! backend, including one that is lying about its own integrity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageResult;

/// Fixed genesis `prevHash`: 64 `'0'` characters.
pub fn genesis_prev_hash() -> String {
    "0".repeat(64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainAlgorithm {
    Sha256,
}

impl std::fmt::Display for ChainAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashChainEntry {
    pub entry_id: String,
    pub tenant_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub algorithm: ChainAlgorithm,
    pub prev_hash: String,
    pub content_hash: String,
    pub payload: serde_json::Value,
}

/// Deterministic canonical encoding of a JSON payload: keys sorted
/// lexicographically at every level, no insignificant whitespace. Used as
/// the input to `content_hash` so two semantically-identical payloads
/// serialized in different field orders hash the same.
pub fn canonicalize(payload: &serde_json::Value) -> Vec<u8> {
    fn sort_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => {
                let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut sorted = serde_json::Map::new();
                for (k, v) in entries {
                    sorted.insert(k.clone(), sort_value(v));
                }
                serde_json::Value::Object(sorted)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(sort_value).collect())
            }
            other => other.clone(),
        }
    }
    // serde_json preserves insertion order by default (preserve_order feature
    // disabled), so a BTreeMap-backed sort pass plus compact serialization is
    // sufficient for a stable, whitespace-free canonical form.
    serde_json::to_vec(&sort_value(payload)).expect("canonical JSON serializes")
}

/// `contentHash = H(canonical(payload))`.
pub fn compute_content_hash(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(payload));
    hex::encode(hasher.finalize())
}

/// `prevHash = H(previous.contentHash || previous.prevHash)`.
pub fn compute_prev_hash(previous_content_hash: &str, previous_prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_content_hash.as_bytes());
    hasher.update(previous_prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage for the per-tenant hash chain.
///
/// Appends are totally ordered per tenant: `sequence` is strictly
/// monotonic starting at 0 with no gaps, and `prev_hash` is derived from
/// the immediately preceding entry (or the genesis constant for sequence
/// 0). Implementations must serialize appends per tenant so the derived
/// fields stay correct under concurrency.
#[async_trait]
pub trait HashChainStore: Send + Sync {
    /// Append a new entry for `tenant_id`, computing `sequence`,
    /// `prev_hash`, and `content_hash` from the current chain tail.
    async fn append(
        &self,
        tenant_id: &str,
        payload: serde_json::Value,
    ) -> StorageResult<HashChainEntry>;

    /// Fetch entries for a tenant within `[start_sequence, end_sequence]`
    /// inclusive (both ends optional), capped at `max_entries`, in
    /// ascending sequence order.
    async fn get_entries(
        &self,
        tenant_id: &str,
        start_sequence: Option<u64>,
        end_sequence: Option<u64>,
        max_entries: Option<usize>,
    ) -> StorageResult<Vec<HashChainEntry>>;

    /// The highest sequence number appended for a tenant, if any.
    async fn latest_sequence(&self, tenant_id: &str) -> StorageResult<Option<u64>>;
}
