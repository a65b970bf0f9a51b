//! runplane-store: storage-layer traits and in-memory reference
//! implementations for the run control plane's durable state.
//!
//! Concrete persistence backends are out of scope for this crate (per the
//! control plane's purpose statement) — it defines the interfaces the rest
//! of the workspace programs against, plus `fakes` used by tests and
//! single-process deployments.
//!
//! ## Components
//!
//! - [`idempotency`] — the idempotency store (F).
//! - [`hash_chain`] — storage side of the hash-chained audit log (L).
//! - [`metering`] — usage events, aggregates, and entitlement enforcement (K).
//! - [`tenant`] — tenant lifecycle and plan limits (N).
//! - [`run_index`] — the queryable run index (D).
//! - [`fakes`] — `Memory*` implementations of the above traits.

pub mod error;
pub mod fakes;
pub mod hash_chain;
pub mod idempotency;
pub mod metering;
pub mod run_index;
pub mod tenant;

pub use error::{StorageError, StorageResult};
pub use hash_chain::{HashChainEntry, HashChainStore};
pub use idempotency::{IdempotencyRecord, IdempotencyStore};
pub use metering::{MeteringBridge, MeteringStore, PaymentEvent, PaymentEventSource};
pub use run_index::{RunIndex, RunIndexEntry, RunIndexFilter};
pub use tenant::{Tenant, TenantStore};
