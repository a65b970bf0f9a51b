//! In-memory reference implementations of the storage traits (testing and
//! single-process deployments only — no external dependencies).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::hash_chain::{
    compute_content_hash, compute_prev_hash, genesis_prev_hash, ChainAlgorithm, HashChainEntry,
    HashChainStore,
};
use crate::idempotency::{
    expires_at, hash_key, normalize_ttl, CheckAndSetOutcome, IdempotencyRecord, IdempotencyStatus,
    IdempotencyStore,
};
use crate::metering::{Bucket, MeteringStore, UsageAggregate, UsageEvent};
use crate::tenant::{
    require_transition, NewTenant, PlanLimits, Tenant, TenantStatus, TenantStore,
    TenantUsageSnapshot, downgrade_blocking_reason,
};
use crate::run_index::{apply_filter, RunIndex, RunIndexEntry, RunIndexFilter};

// ---------------------------------------------------------------------------
// MemoryIdempotencyStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn check_and_set(
        &self,
        key: &str,
        tenant_id: &str,
        ttl_seconds: Option<i64>,
        payload_hash: Option<&str>,
    ) -> StorageResult<CheckAndSetOutcome> {
        let key_hash = hash_key(key);
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();

        if let Some(existing) = records.get(&key_hash) {
            if !existing.is_expired(now) {
                if let (Some(provided), Some(stored)) = (payload_hash, &existing.payload_hash) {
                    if provided != stored {
                        return Err(StorageError::IdempotencyCollision {
                            key_hash,
                            stored: stored.clone(),
                            provided: provided.to_string(),
                        });
                    }
                }
                return Ok(CheckAndSetOutcome {
                    is_new: false,
                    record: existing.clone(),
                });
            }
        }

        let ttl = normalize_ttl(ttl_seconds);
        let record = IdempotencyRecord {
            key_hash: key_hash.clone(),
            key: key.to_string(),
            tenant_id: tenant_id.to_string(),
            status: IdempotencyStatus::Pending,
            run_id: None,
            result: None,
            payload_hash: payload_hash.map(|s| s.to_string()),
            created_at: now,
            expires_at: expires_at(now, ttl),
        };
        records.insert(key_hash, record.clone());
        Ok(CheckAndSetOutcome {
            is_new: true,
            record,
        })
    }

    async fn complete(
        &self,
        key_hash: &str,
        run_id: &str,
        result: Option<serde_json::Value>,
    ) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(key_hash)
            .ok_or_else(|| StorageError::IdempotencyNotFound {
                key_hash: key_hash.to_string(),
            })?;
        record.status = IdempotencyStatus::Completed;
        record.run_id = Some(run_id.to_string());
        record.result = result;
        Ok(())
    }

    async fn fail(&self, key_hash: &str, error: &str) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(key_hash)
            .ok_or_else(|| StorageError::IdempotencyNotFound {
                key_hash: key_hash.to_string(),
            })?;
        record.status = IdempotencyStatus::Failed;
        record.result = Some(serde_json::json!({ "error": error }));
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<IdempotencyRecord>> {
        let key_hash = hash_key(key);
        let records = self.records.lock().unwrap();
        Ok(records.get(&key_hash).cloned())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let key_hash = hash_key(key);
        let now = Utc::now();
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&key_hash)
            .map(|r| !r.is_expired(now))
            .unwrap_or(false))
    }

    async fn cleanup(&self, batch: Option<usize>) -> StorageResult<usize> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let expired: Vec<String> = records
            .iter()
            .filter(|(_, r)| r.is_expired(now))
            .take(batch.unwrap_or(usize::MAX))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            records.remove(k);
        }
        Ok(expired.len())
    }
}

// ---------------------------------------------------------------------------
// MemoryHashChainStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryHashChainStore {
    chains: Mutex<HashMap<String, Vec<HashChainEntry>>>,
}

impl MemoryHashChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HashChainStore for MemoryHashChainStore {
    async fn append(
        &self,
        tenant_id: &str,
        payload: serde_json::Value,
    ) -> StorageResult<HashChainEntry> {
        let mut chains = self.chains.lock().unwrap();
        let chain = chains.entry(tenant_id.to_string()).or_default();
        let content_hash = compute_content_hash(&payload);
        let (sequence, prev_hash) = match chain.last() {
            Some(last) => (
                last.sequence + 1,
                compute_prev_hash(&last.content_hash, &last.prev_hash),
            ),
            None => (0, genesis_prev_hash()),
        };
        let entry = HashChainEntry {
            entry_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            sequence,
            timestamp: Utc::now(),
            algorithm: ChainAlgorithm::Sha256,
            prev_hash,
            content_hash,
            payload,
        };
        chain.push(entry.clone());
        Ok(entry)
    }

    async fn get_entries(
        &self,
        tenant_id: &str,
        start_sequence: Option<u64>,
        end_sequence: Option<u64>,
        max_entries: Option<usize>,
    ) -> StorageResult<Vec<HashChainEntry>> {
        let chains = self.chains.lock().unwrap();
        let chain = chains.get(tenant_id).cloned().unwrap_or_default();
        let start = start_sequence.unwrap_or(0);
        let end = end_sequence.unwrap_or(u64::MAX);
        let filtered: Vec<HashChainEntry> = chain
            .into_iter()
            .filter(|e| e.sequence >= start && e.sequence <= end)
            .take(max_entries.unwrap_or(usize::MAX))
            .collect();
        Ok(filtered)
    }

    async fn latest_sequence(&self, tenant_id: &str) -> StorageResult<Option<u64>> {
        let chains = self.chains.lock().unwrap();
        Ok(chains.get(tenant_id).and_then(|c| c.last()).map(|e| e.sequence))
    }
}

// ---------------------------------------------------------------------------
// MemoryMeteringStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryMeteringStore {
    events: Mutex<HashMap<String, Vec<UsageEvent>>>,
}

impl MemoryMeteringStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(bucket: Bucket, event: &UsageEvent) -> bool {
        match bucket {
            Bucket::Day(d) => event.occurred_at.date_naive() == d,
            Bucket::Month { year, month } => {
                let d = event.occurred_at.date_naive();
                d.format("%Y").to_string().parse::<i32>().unwrap() == year
                    && d.format("%m").to_string().parse::<u32>().unwrap() == month
            }
        }
    }
}

#[async_trait]
impl MeteringStore for MemoryMeteringStore {
    async fn record(&self, event: UsageEvent) -> StorageResult<()> {
        let mut events = self.events.lock().unwrap();
        events.entry(event.tenant_id.clone()).or_default().push(event);
        Ok(())
    }

    async fn get_aggregate(&self, tenant_id: &str, bucket: Bucket) -> StorageResult<UsageAggregate> {
        let events = self.events.lock().unwrap();
        let mut counters = HashMap::new();
        if let Some(tenant_events) = events.get(tenant_id) {
            for event in tenant_events.iter().filter(|e| Self::matches(bucket, e)) {
                *counters.entry(event.event_type.clone()).or_insert(0u64) += event.quantity;
            }
        }
        Ok(UsageAggregate {
            tenant_id: tenant_id.to_string(),
            bucket_key: bucket.key(),
            counters,
        })
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        bucket: Option<Bucket>,
    ) -> StorageResult<Vec<UsageEvent>> {
        let events = self.events.lock().unwrap();
        let tenant_events = events.get(tenant_id).cloned().unwrap_or_default();
        Ok(match bucket {
            Some(b) => tenant_events
                .into_iter()
                .filter(|e| Self::matches(b, e))
                .collect(),
            None => tenant_events,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTenantStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryTenantStore {
    tenants: Mutex<HashMap<String, Tenant>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn create(&self, new_tenant: NewTenant) -> StorageResult<Tenant> {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            org_id: new_tenant.org_id,
            org_login: new_tenant.org_login,
            display_name: new_tenant.display_name,
            installation_id: new_tenant.installation_id,
            installed_by: new_tenant.installed_by,
            plan: new_tenant.plan,
            plan_limits: new_tenant.plan_limits,
            status: TenantStatus::Active,
            runs_this_month: 0,
            created_at: now,
            updated_at: now,
            settings: new_tenant.settings.unwrap_or_default(),
        };
        let mut tenants = self.tenants.lock().unwrap();
        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn get(&self, tenant_id: &str) -> StorageResult<Tenant> {
        let tenants = self.tenants.lock().unwrap();
        tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| StorageError::TenantNotFound {
                tenant_id: tenant_id.to_string(),
            })
    }

    async fn suspend(&self, tenant_id: &str, _reason: &str, _by: &str) -> StorageResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Suspended)
    }

    async fn activate(&self, tenant_id: &str, _by: &str) -> StorageResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Active)
    }

    async fn pause(&self, tenant_id: &str, _by: &str) -> StorageResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Paused)
    }

    async fn delete(&self, tenant_id: &str, _by: &str) -> StorageResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Deactivated)
    }

    async fn hard_delete(&self, tenant_id: &str, confirm_token: &str) -> StorageResult<()> {
        if confirm_token != tenant_id {
            return Err(StorageError::ConfirmTokenMismatch {
                tenant_id: tenant_id.to_string(),
            });
        }
        let mut tenants = self.tenants.lock().unwrap();
        tenants
            .remove(tenant_id)
            .ok_or_else(|| StorageError::TenantNotFound {
                tenant_id: tenant_id.to_string(),
            })?;
        Ok(())
    }

    async fn change_plan(
        &self,
        tenant_id: &str,
        new_plan: &str,
        new_limits: PlanLimits,
        usage: TenantUsageSnapshot,
    ) -> StorageResult<Tenant> {
        if let Some(reason) = downgrade_blocking_reason(&usage, &new_limits) {
            return Err(StorageError::PlanDowngradeRefused {
                tenant_id: tenant_id.to_string(),
                reason,
            });
        }
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StorageError::TenantNotFound {
                tenant_id: tenant_id.to_string(),
            })?;
        tenant.plan = new_plan.to_string();
        tenant.plan_limits = new_limits;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }
}

impl MemoryTenantStore {
    fn transition(&self, tenant_id: &str, to: TenantStatus) -> StorageResult<Tenant> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StorageError::TenantNotFound {
                tenant_id: tenant_id.to_string(),
            })?;
        require_transition(tenant_id, &tenant.status, &to)?;
        tenant.status = to;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryRunIndex
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryRunIndex {
    entries: Mutex<HashMap<String, RunIndexEntry>>,
}

impl MemoryRunIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunIndex for MemoryRunIndex {
    async fn put(&self, entry: RunIndexEntry) -> StorageResult<()> {
        self.entries.lock().unwrap().insert(entry.run_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, run_id: &str) -> StorageResult<Option<RunIndexEntry>> {
        Ok(self.entries.lock().unwrap().get(run_id).cloned())
    }

    async fn list(&self, filter: RunIndexFilter) -> StorageResult<Vec<RunIndexEntry>> {
        let entries: Vec<_> = self.entries.lock().unwrap().values().cloned().collect();
        Ok(apply_filter(entries, &filter))
    }

    async fn delete(&self, run_id: &str) -> StorageResult<()> {
        self.entries.lock().unwrap().remove(run_id);
        Ok(())
    }

    async fn sync_from_bundles(&self, entries: Vec<RunIndexEntry>) -> StorageResult<()> {
        let mut guard = self.entries.lock().unwrap();
        guard.clear();
        for entry in entries {
            guard.insert(entry.run_id.clone(), entry);
        }
        Ok(())
    }
}
