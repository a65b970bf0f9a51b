//! Runplane core: the run domain model, state machine, artifact store,
//! reliability fabric, complexity scorer, and readiness gate.
//!
//! Persistent storage-layer traits and in-memory reference implementations
//! (run index, idempotency store, hash-chained audit, metering, tenant
//! lifecycle) live in `runplane-store`; the auto-action engine lives in
//! `runplane-actions`.

pub mod artifacts;
pub mod audit;
pub mod capabilities;
pub mod chain_verifier;
pub mod checkpoint;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod readiness;
pub mod reliability;
pub mod run_context;
pub mod scorer;
pub mod state_machine;
pub mod telemetry;

pub use artifacts::{sync_run_index, ArtifactHash, ArtifactStore};
pub use capabilities::{check_approval, execute_if_approved, Approval, GatedOperation, Scope};
pub use chain_verifier::{is_chain_valid, verify as verify_chain, Issue, IssueType, Severity as ChainIssueSeverity, VerificationReport, VerifyOptions};
pub use checkpoint::{analyze_resume_point, merge_artifacts, Checkpoint, ResumeDecision, ResumeOptions};
pub use config::{RateLimitConfig, RunplaneConfig};
pub use domain::{
    CapabilitiesMode, NewRun, RepoDescriptor, Result, Run, RunState, RunplaneError,
    StateHistoryEntry, RUN_SCHEMA_VERSION,
};
pub use metrics::{increment as metric_increment, MetricsSink};
pub use obs::RunSpan;
pub use readiness::{evaluate as evaluate_readiness, Category as ReadinessCategory, Check as ReadinessCheck};
pub use reliability::{CircuitBreaker, CircuitBreakerConfig, RateLimiter, RetryPolicy, RunLock};
pub use run_context::RunContext;
pub use scorer::{
    apply_adjustment, calculate_baseline_score, calculate_local_triage_score, risk_band, validate_adjustment,
    FileRisk, ScoringFeatures,
};
pub use state_machine::{is_valid as is_valid_transition, progress as run_progress};
pub use telemetry::init_tracing;

/// Runplane version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
