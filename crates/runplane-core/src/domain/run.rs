//! The run data model (spec §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version of the `run.json` artifact (spec §6.2).
pub const RUN_SCHEMA_VERSION: u32 = 1;

/// One of the lifecycle states a run moves through. See [`crate::state_machine`]
/// for the legal transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Triaged,
    Planned,
    Resolving,
    Review,
    AwaitingApproval,
    Applying,
    Done,
    Aborted,
    Failed,
}

impl RunState {
    /// Terminal states never transition further (spec §3.1 invariant).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Triaged => "triaged",
            RunState::Planned => "planned",
            RunState::Resolving => "resolving",
            RunState::Review => "review",
            RunState::AwaitingApproval => "awaiting_approval",
            RunState::Applying => "applying",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mode under which a run's gated (external-world-touching) operations
/// may execute (spec §3.1, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilitiesMode {
    CommentOnly,
    PatchOnly,
    CommitAfterApproval,
}

impl Default for CapabilitiesMode {
    fn default() -> Self {
        CapabilitiesMode::PatchOnly
    }
}

/// Immutable descriptor of the repository a run targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub pr_url: Option<String>,
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
}

/// One entry in a run's state history (spec §3.1 `previousStates`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub state: RunState,
    pub entered_at: DateTime<Utc>,
}

/// The `run.json` artifact: a run plus its schema version (spec §3.1, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub tenant_id: String,
    pub repo: RepoDescriptor,
    pub state: RunState,
    pub previous_states: Vec<StateHistoryEntry>,
    pub capabilities_mode: CapabilitiesMode,
    pub models: std::collections::BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub initiator: String,
    pub error: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub version: u32,
}

/// Parameters accepted by [`crate::run_context::RunContext::create`].
#[derive(Debug, Clone)]
pub struct NewRun {
    pub repo: RepoDescriptor,
    pub initiator: String,
    pub tenant_id: String,
    pub capabilities_mode: Option<CapabilitiesMode>,
    pub models: Option<std::collections::BTreeMap<String, String>>,
}

impl Run {
    pub fn new(run_id: String, params: NewRun) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            tenant_id: params.tenant_id,
            repo: params.repo,
            state: RunState::Queued,
            previous_states: vec![StateHistoryEntry {
                state: RunState::Queued,
                entered_at: now,
            }],
            capabilities_mode: params.capabilities_mode.unwrap_or_default(),
            models: params.models.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            initiator: params.initiator,
            error: None,
            error_details: None,
            completed_at: None,
            duration_ms: None,
            version: RUN_SCHEMA_VERSION,
        }
    }
}
