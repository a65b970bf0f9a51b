//! Tenant lifecycle (N).
//!
//! Tenants own plan limits and a lifecycle state machine independent of
//! (but referenced by id from) runs. Plan changes are validated by walking
//! current usage against the target plan's limits before being applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Paused,
    Suspended,
    Deactivated,
}

impl TenantStatus {
    /// Whether `self -> to` is an allowed lifecycle edge (§4.14).
    pub fn can_transition_to(&self, to: &TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (self, to),
            (Active, Suspended)
                | (Suspended, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Deactivated)
                | (Paused, Deactivated)
                | (Suspended, Deactivated)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub runs_per_month: u64,
    pub runs_per_day: u64,
    pub signals_per_day: u64,
    pub repos: u64,
    pub members: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings(pub serde_json::Value);

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings(serde_json::json!({}))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub org_id: String,
    pub org_login: String,
    pub display_name: String,
    pub installation_id: Option<String>,
    pub installed_by: String,
    pub plan: String,
    pub plan_limits: PlanLimits,
    pub status: TenantStatus,
    pub runs_this_month: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: TenantSettings,
}

/// Current resource usage, used to validate a plan downgrade (S8).
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantUsageSnapshot {
    pub active_repos: u64,
    pub active_members: u64,
    pub runs_this_month: u64,
    pub signals_today: u64,
}

/// Check whether `usage` fits within `target`, returning the first
/// dimension that would be exceeded (spec wording: "11 active repos
/// exceeds limit of 10").
pub fn downgrade_blocking_reason(
    usage: &TenantUsageSnapshot,
    target: &PlanLimits,
) -> Option<String> {
    if usage.active_repos > target.repos {
        return Some(format!(
            "{} active repos exceeds limit of {}",
            usage.active_repos, target.repos
        ));
    }
    if usage.active_members > target.members {
        return Some(format!(
            "{} active members exceeds limit of {}",
            usage.active_members, target.members
        ));
    }
    if usage.runs_this_month > target.runs_per_month {
        return Some(format!(
            "{} runs this month exceeds limit of {}",
            usage.runs_this_month, target.runs_per_month
        ));
    }
    if usage.signals_today > target.signals_per_day {
        return Some(format!(
            "{} signals today exceeds limit of {}",
            usage.signals_today, target.signals_per_day
        ));
    }
    None
}

pub struct NewTenant {
    pub org_id: String,
    pub org_login: String,
    pub display_name: String,
    pub installation_id: Option<String>,
    pub installed_by: String,
    pub plan: String,
    pub plan_limits: PlanLimits,
    pub settings: Option<TenantSettings>,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Create a tenant with `status = active`, zeroed counters.
    async fn create(&self, tenant: NewTenant) -> StorageResult<Tenant>;

    async fn get(&self, tenant_id: &str) -> StorageResult<Tenant>;

    /// Move `active -> suspended`.
    async fn suspend(&self, tenant_id: &str, reason: &str, by: &str) -> StorageResult<Tenant>;

    /// Move `suspended -> active`.
    async fn activate(&self, tenant_id: &str, by: &str) -> StorageResult<Tenant>;

    /// Move `active -> paused`.
    async fn pause(&self, tenant_id: &str, by: &str) -> StorageResult<Tenant>;

    /// Soft delete: move to `deactivated`, recoverable.
    async fn delete(&self, tenant_id: &str, by: &str) -> StorageResult<Tenant>;

    /// Hard delete. Refuses unless `confirm_token == tenant_id`.
    async fn hard_delete(&self, tenant_id: &str, confirm_token: &str) -> StorageResult<()>;

    /// Validate and, if feasible, apply a plan change given a usage
    /// snapshot computed by the caller (metering + tenant-scoped counts).
    async fn change_plan(
        &self,
        tenant_id: &str,
        new_plan: &str,
        new_limits: PlanLimits,
        usage: TenantUsageSnapshot,
    ) -> StorageResult<Tenant>;
}

/// Shared transition-guard helper used by store implementations so the
/// "only these edges are legal" rule lives in one place.
pub fn require_transition(
    tenant_id: &str,
    from: &TenantStatus,
    to: &TenantStatus,
) -> StorageResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StorageError::InvalidTenantTransition {
            tenant_id: tenant_id.to_string(),
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_to_suspended_is_legal() {
        assert!(TenantStatus::Active.can_transition_to(&TenantStatus::Suspended));
    }

    #[test]
    fn deactivated_is_terminal() {
        assert!(!TenantStatus::Deactivated.can_transition_to(&TenantStatus::Active));
    }

    #[test]
    fn downgrade_blocked_on_repos() {
        let usage = TenantUsageSnapshot {
            active_repos: 11,
            ..Default::default()
        };
        let target = PlanLimits {
            runs_per_month: 1000,
            runs_per_day: 100,
            signals_per_day: 1000,
            repos: 10,
            members: 50,
        };
        let reason = downgrade_blocking_reason(&usage, &target).unwrap();
        assert_eq!(reason, "11 active repos exceeds limit of 10");
    }

    #[test]
    fn downgrade_allowed_when_within_limits() {
        let usage = TenantUsageSnapshot {
            active_repos: 3,
            ..Default::default()
        };
        let target = PlanLimits {
            runs_per_month: 1000,
            runs_per_day: 100,
            signals_per_day: 1000,
            repos: 10,
            members: 50,
        };
        assert!(downgrade_blocking_reason(&usage, &target).is_none());
    }
}
