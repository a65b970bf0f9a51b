//! Resume-point analysis (I, spec §4.6).
//!
//! A [`Checkpoint`] records the per-step progress of a run's pipeline plus
//! the artifacts each step produced. [`analyze_resume_point`] decides where
//! a retried/resumed run should pick up, and [`merge_artifacts`] folds a new
//! checkpoint's artifacts over an old one with last-writer-wins semantics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Result, RunState, RunplaneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub hash: String,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub steps: Vec<StepRecord>,
    pub artifacts: BTreeMap<String, ArtifactRecord>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    pub force_restart: bool,
    pub skip_to_step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeDecision {
    pub start_step_index: usize,
    pub reason: String,
    /// The checkpoint's artifacts, last-writer-wins merged, so a caller can
    /// rehydrate state before resuming. Empty when there is no checkpoint.
    pub available_artifacts: BTreeMap<String, ArtifactRecord>,
}

/// Decide which step a resumed run should start from (spec §4.6).
///
/// Precedence: a terminal run can never be resumed; `force_restart` always
/// wins over any checkpoint; `skip_to_step` names an explicit step; absent
/// either, resume at the checkpoint's first non-completed step; with no
/// checkpoint at all, start from the beginning.
pub fn analyze_resume_point(
    run_id: &str,
    run_state: RunState,
    checkpoint: Option<&Checkpoint>,
    options: &ResumeOptions,
) -> Result<ResumeDecision> {
    if run_state.is_terminal() {
        return Err(RunplaneError::InvalidTransition {
            run_id: run_id.to_string(),
            from: run_state.as_str().to_string(),
            to: "resuming".to_string(),
        });
    }

    // The checkpoint's own artifact map is already unique-keyed, but we
    // still route it through `merge_artifacts` (over an empty base) so the
    // decision always carries the same last-writer-wins merge semantics a
    // caller rehydrating from more than one checkpoint would see.
    let available_artifacts = checkpoint
        .map(|c| merge_artifacts(&BTreeMap::new(), &c.artifacts))
        .unwrap_or_default();

    if options.force_restart {
        return Ok(ResumeDecision {
            start_step_index: 0,
            reason: "force_restart requested".to_string(),
            available_artifacts,
        });
    }

    let checkpoint = match checkpoint {
        Some(c) => c,
        None => {
            return Ok(ResumeDecision {
                start_step_index: 0,
                reason: "no checkpoint on record".to_string(),
                available_artifacts,
            })
        }
    };

    if let Some(target) = &options.skip_to_step {
        return match checkpoint.steps.iter().position(|s| &s.name == target) {
            Some(idx) => Ok(ResumeDecision {
                start_step_index: idx,
                reason: format!("skip_to_step={target}"),
                available_artifacts,
            }),
            None => Err(RunplaneError::MalformedInput(format!(
                "skip_to_step names unknown step {target}"
            ))),
        };
    }

    let first_incomplete = checkpoint
        .steps
        .iter()
        .position(|s| !matches!(s.status, StepStatus::Completed | StepStatus::Skipped));

    match first_incomplete {
        Some(idx) => Ok(ResumeDecision {
            start_step_index: idx,
            reason: format!("first non-completed step is {}", checkpoint.steps[idx].name),
            available_artifacts,
        }),
        None => Ok(ResumeDecision {
            start_step_index: checkpoint.steps.len(),
            reason: "all recorded steps completed".to_string(),
            available_artifacts,
        }),
    }
}

/// Merge `incoming` over `base`, last-writer-wins per artifact name by
/// `written_at` (spec §4.6).
pub fn merge_artifacts(
    base: &BTreeMap<String, ArtifactRecord>,
    incoming: &BTreeMap<String, ArtifactRecord>,
) -> BTreeMap<String, ArtifactRecord> {
    let mut merged = base.clone();
    for (name, record) in incoming {
        match merged.get(name) {
            Some(existing) if existing.written_at >= record.written_at => {}
            _ => {
                merged.insert(name.clone(), record.clone());
            }
        }
    }
    merged
}
