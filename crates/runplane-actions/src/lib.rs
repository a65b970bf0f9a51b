//! The auto-action engine (O): registers tenant-scoped actions, matches
//! alerts against trigger filters, and dispatches with the rate-limit and
//! circuit-breaker protection defined in `runplane-core`.

pub mod adapters;
pub mod audit;
pub mod engine;
pub mod model;

pub use adapters::{ActionAdapter, AdapterError, LogAdapter};
pub use audit::{ActionAuditEntry, ActionAuditLog, MemoryActionAuditLog};
pub use engine::{ActionEngine, EngineError};
pub use model::{
    Action, ActionType, Alert, CircuitBreakerSpec, Execution, ExecutionState, RateLimitSpec,
    RetryConfig, Severity, Trigger,
};
