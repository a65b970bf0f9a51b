//! Metering & entitlements (K).
//!
//! Usage ingestion, daily/monthly aggregates, entitlement checks against
//! plan limits, and the 402/429 enforcement envelopes. Also the narrow
//! Stripe-shaped payment event bridge (supplemented per SPEC_FULL, not in
//! the distilled spec's §4.11 body but named there as "Stripe / payment
//! bridge").

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StorageResult;
use crate::tenant::PlanLimits;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// A usage bucket: either a UTC calendar day or a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl Bucket {
    pub fn day(dt: DateTime<Utc>) -> Self {
        Bucket::Day(dt.date_naive())
    }

    pub fn month(dt: DateTime<Utc>) -> Self {
        Bucket::Month {
            year: dt.date_naive().format("%Y").to_string().parse().unwrap(),
            month: dt.date_naive().format("%m").to_string().parse().unwrap(),
        }
    }

    pub fn key(&self) -> String {
        match self {
            Bucket::Day(d) => d.format("%Y-%m-%d").to_string(),
            Bucket::Month { year, month } => format!("{year:04}-{month:02}"),
        }
    }
}

/// Per-type counters for a `(tenant, bucket)`.
///
/// Invariant (property 12, §8): the sum of `quantity` across events in a
/// bucket for a given type equals `counters[type]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageAggregate {
    pub tenant_id: String,
    pub bucket_key: String,
    pub counters: HashMap<String, u64>,
}

impl UsageAggregate {
    pub fn total_for(&self, event_type: &str) -> u64 {
        self.counters.get(event_type).copied().unwrap_or(0)
    }
}

/// Metering store: ingestion plus aggregate queries.
///
/// `record` must update the event log, the daily aggregate, and the
/// monthly aggregate as a single logical transaction (§5: "Metering event
/// ingestion is per-tenant serialized... so aggregates match event
/// sums").
#[async_trait]
pub trait MeteringStore: Send + Sync {
    async fn record(&self, event: UsageEvent) -> StorageResult<()>;

    async fn get_aggregate(&self, tenant_id: &str, bucket: Bucket) -> StorageResult<UsageAggregate>;

    async fn list_events(
        &self,
        tenant_id: &str,
        bucket: Option<Bucket>,
    ) -> StorageResult<Vec<UsageEvent>>;
}

/// Resources `checkEntitlement`/`enforceLimit` can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementResource {
    RunsPerDay,
    RunsPerMonth,
    SignalsPerDay,
    Repos,
    Members,
}

impl EntitlementResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementResource::RunsPerDay => "runs_per_day",
            EntitlementResource::RunsPerMonth => "runs_per_month",
            EntitlementResource::SignalsPerDay => "signals_per_day",
            EntitlementResource::Repos => "repos",
            EntitlementResource::Members => "members",
        }
    }

    fn limit(&self, limits: &PlanLimits) -> u64 {
        match self {
            EntitlementResource::RunsPerDay => limits.runs_per_day,
            EntitlementResource::RunsPerMonth => limits.runs_per_month,
            EntitlementResource::SignalsPerDay => limits.signals_per_day,
            EntitlementResource::Repos => limits.repos,
            EntitlementResource::Members => limits.members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementCheck {
    pub allowed: bool,
    pub current: u64,
    pub limit: u64,
    pub reason: Option<String>,
}

/// Pure decision function: would admitting `amount` more push `current`
/// past `limit`?
pub fn check_entitlement(
    resource: EntitlementResource,
    current: u64,
    limits: &PlanLimits,
    amount: u64,
) -> EntitlementCheck {
    let limit = resource.limit(limits);
    let projected = current + amount;
    if projected <= limit {
        EntitlementCheck {
            allowed: true,
            current,
            limit,
            reason: None,
        }
    } else {
        EntitlementCheck {
            allowed: false,
            current,
            limit,
            reason: Some(format!(
                "{} would exceed limit ({}/{})",
                resource.as_str(),
                projected,
                limit
            )),
        }
    }
}

/// HTTP-like denial envelope (§6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementEnvelope {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub retry_after_seconds: Option<u64>,
    pub limit: u64,
    pub current: u64,
    pub resource: String,
    pub upgrade_hint: Option<String>,
}

pub fn build_402_response(check: &EntitlementCheck, resource: EntitlementResource) -> EnforcementEnvelope {
    EnforcementEnvelope {
        status: 402,
        code: "QUOTA_EXCEEDED".to_string(),
        message: format!("plan limit reached for {}", resource.as_str()),
        detail: check.reason.clone(),
        retry_after_seconds: None,
        limit: check.limit,
        current: check.current,
        resource: resource.as_str().to_string(),
        upgrade_hint: Some("upgrade plan to raise this limit".to_string()),
    }
}

pub fn build_429_response(
    resource: &str,
    limit: u64,
    current: u64,
    retry_after_seconds: u64,
) -> EnforcementEnvelope {
    EnforcementEnvelope {
        status: 429,
        code: "RATE_LIMITED".to_string(),
        message: format!("rate limit exceeded for {resource}"),
        detail: None,
        retry_after_seconds: Some(retry_after_seconds),
        limit,
        current,
        resource: resource.to_string(),
        upgrade_hint: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementDecision {
    Admit,
    DenyQuota,
    DenyRate,
}

#[derive(Debug, Clone)]
pub struct EnforcementOutcome {
    pub decision: EnforcementDecision,
    pub response: Option<EnforcementEnvelope>,
}

/// `enforceLimit`: combine an entitlement check with a separate rate-limit
/// admission (computed by the reliability layer) into one decision.
pub fn enforce_limit(
    entitlement: EntitlementCheck,
    resource: EntitlementResource,
    rate_allowed: bool,
    retry_after_seconds: u64,
) -> EnforcementOutcome {
    if !rate_allowed {
        return EnforcementOutcome {
            decision: EnforcementDecision::DenyRate,
            response: Some(build_429_response(
                resource.as_str(),
                entitlement.limit,
                entitlement.current,
                retry_after_seconds,
            )),
        };
    }
    if !entitlement.allowed {
        return EnforcementOutcome {
            decision: EnforcementDecision::DenyQuota,
            response: Some(build_402_response(&entitlement, resource)),
        };
    }
    EnforcementOutcome {
        decision: EnforcementDecision::Admit,
        response: None,
    }
}

// ---------------------------------------------------------------------------
// Payment / subscription bridge
// ---------------------------------------------------------------------------

/// Shape of an inbound payment-provider webhook event, translated by the
/// caller from whatever wire format the provider sends. No concrete
/// provider SDK lives here (payment providers are out of scope; §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub event_type: PaymentEventType,
    pub plan: Option<String>,
    pub plan_limits: Option<PlanLimits>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    SubscriptionCreated,
    SubscriptionUpdated,
    InvoicePaid,
    InvoicePaymentFailed,
}

/// Source of payment events, implemented by an adapter the caller wires
/// up (e.g. a Stripe webhook handler translating its payload into
/// `PaymentEvent`s before calling the bridge).
#[async_trait]
pub trait PaymentEventSource: Send + Sync {
    async fn next_event(&self) -> StorageResult<Option<PaymentEvent>>;
}

/// Projects payment events onto tenant plan state, idempotent on
/// `event_id` via the idempotency store.
pub struct MeteringBridge<'a> {
    pub idempotency: &'a dyn crate::idempotency::IdempotencyStore,
    pub tenants: &'a dyn crate::tenant::TenantStore,
}

impl<'a> MeteringBridge<'a> {
    pub fn new(
        idempotency: &'a dyn crate::idempotency::IdempotencyStore,
        tenants: &'a dyn crate::tenant::TenantStore,
    ) -> Self {
        Self { idempotency, tenants }
    }

    /// Apply one payment event. Returns `Ok(false)` without side effects if
    /// the event id was already processed.
    pub async fn apply(&self, event: PaymentEvent) -> StorageResult<bool> {
        let key = format!("payment-event:{}", event.event_id);
        let outcome = self
            .idempotency
            .check_and_set(&key, &event.tenant_id, Some(DAY_SECONDS), None)
            .await?;
        if !outcome.is_new {
            return Ok(false);
        }

        let result = match event.event_type {
            PaymentEventType::SubscriptionCreated | PaymentEventType::SubscriptionUpdated => {
                if let (Some(plan), Some(limits)) = (event.plan.clone(), event.plan_limits) {
                    let tenant = self.tenants.get(&event.tenant_id).await?;
                    let usage = crate::tenant::TenantUsageSnapshot {
                        runs_this_month: tenant.runs_this_month,
                        ..Default::default()
                    };
                    self.tenants
                        .change_plan(&event.tenant_id, &plan, limits, usage)
                        .await
                        .map(|_| ())
                } else {
                    Ok(())
                }
            }
            PaymentEventType::InvoicePaid => {
                self.tenants
                    .activate(&event.tenant_id, "payment-bridge")
                    .await
                    .map(|_| ())
            }
            PaymentEventType::InvoicePaymentFailed => {
                self.tenants
                    .pause(&event.tenant_id, "payment-bridge")
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                self.idempotency.complete(&key, "payment-bridge", None).await.ok();
                Ok(true)
            }
            Err(e) => {
                self.idempotency.fail(&key, &e.to_string()).await.ok();
                Err(e)
            }
        }
    }
}

const DAY_SECONDS: i64 = 86_400;

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PlanLimits {
        PlanLimits {
            runs_per_month: 100,
            runs_per_day: 10,
            signals_per_day: 50,
            repos: 5,
            members: 5,
        }
    }

    #[test]
    fn entitlement_allows_under_limit() {
        let check = check_entitlement(EntitlementResource::RunsPerDay, 3, &limits(), 1);
        assert!(check.allowed);
    }

    #[test]
    fn entitlement_denies_at_limit() {
        let check = check_entitlement(EntitlementResource::RunsPerDay, 10, &limits(), 1);
        assert!(!check.allowed);
        assert!(check.reason.is_some());
    }

    #[test]
    fn enforce_limit_prefers_rate_denial_over_quota() {
        let check = check_entitlement(EntitlementResource::RunsPerDay, 10, &limits(), 1);
        let outcome = enforce_limit(check, EntitlementResource::RunsPerDay, false, 30);
        assert_eq!(outcome.decision, EnforcementDecision::DenyRate);
        assert_eq!(outcome.response.unwrap().status, 429);
    }

    #[test]
    fn enforce_limit_denies_quota_when_rate_admits() {
        let check = check_entitlement(EntitlementResource::RunsPerDay, 10, &limits(), 1);
        let outcome = enforce_limit(check, EntitlementResource::RunsPerDay, true, 0);
        assert_eq!(outcome.decision, EnforcementDecision::DenyQuota);
        assert_eq!(outcome.response.unwrap().status, 402);
    }

    #[test]
    fn bucket_key_formats() {
        let d = chrono::NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert_eq!(Bucket::Day(d).key(), "2026-07-27");
        assert_eq!(Bucket::Month { year: 2026, month: 7 }.key(), "2026-07");
    }
}
