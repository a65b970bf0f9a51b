//! The capabilities gate (G, spec §4.5).
//!
//! Maps gated operations to the scope they require under a run's
//! [`CapabilitiesMode`], and runs an ordered rule chain to decide whether an
//! approval record authorizes a given operation for a given run/patch.

use serde::{Deserialize, Serialize};

use crate::domain::{CapabilitiesMode, Result, RunplaneError};

/// A gated operation an action/worker wants to perform against a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedOperation {
    GitCommit,
    GitPush,
    PrCreate,
    PrUpdate,
    PrMerge,
    BranchDelete,
    FileWrite,
}

/// The coarse-grained scope a [`GatedOperation`] requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Commit,
    Push,
    OpenPr,
    Merge,
}

/// `capabilities_mode` grants scopes up to and including the named level.
impl CapabilitiesMode {
    fn granted_scopes(self) -> &'static [Scope] {
        use Scope::*;
        match self {
            CapabilitiesMode::CommentOnly => &[],
            // Patch-only runs only ever produce a patch artifact; they never
            // touch git, so this grants the same empty set as comment-only.
            CapabilitiesMode::PatchOnly => &[],
            CapabilitiesMode::CommitAfterApproval => &[Commit, Push, OpenPr, Merge],
        }
    }
}

pub fn required_scope(op: GatedOperation) -> Scope {
    use GatedOperation::*;
    match op {
        GitCommit => Scope::Commit,
        GitPush => Scope::Push,
        PrCreate => Scope::OpenPr,
        PrUpdate => Scope::Push,
        PrMerge => Scope::Merge,
        BranchDelete => Scope::Push,
        FileWrite => Scope::Commit,
    }
}

/// A recorded approval authorizing a specific run's patch.
#[derive(Debug, Clone)]
pub struct Approval {
    pub run_id: String,
    pub patch_hash: String,
    pub granted_scopes: Vec<Scope>,
}

/// Check whether `approval` (if any) authorizes `op` on `run_id` with the
/// given `patch_hash`, under `mode`. Rule order (spec §4.5): no approval,
/// then run id mismatch, then missing scope, then patch hash mismatch,
/// finally approve.
pub fn check_approval(
    mode: CapabilitiesMode,
    run_id: &str,
    op: GatedOperation,
    patch_hash: &str,
    approval: Option<&Approval>,
) -> Result<()> {
    let scope = required_scope(op);
    if !mode.granted_scopes().contains(&scope) {
        return Err(RunplaneError::ApprovalDenied(format!(
            "capabilities mode does not grant {scope:?}"
        )));
    }

    let approval = match approval {
        Some(a) => a,
        None => return Err(RunplaneError::ApprovalDenied("no approval on record".into())),
    };

    if approval.run_id != run_id {
        return Err(RunplaneError::ApprovalDenied(format!(
            "approval is for run {}, not {run_id}",
            approval.run_id
        )));
    }

    if !approval.granted_scopes.contains(&scope) {
        return Err(RunplaneError::ApprovalDenied(format!("approval lacks {scope:?} scope")));
    }

    if approval.patch_hash != patch_hash {
        return Err(RunplaneError::PatchMismatch {
            approval: approval.patch_hash.clone(),
            provided: patch_hash.to_string(),
        });
    }

    Ok(())
}

/// Validate the approval, returning `Ok(())` only if `op` may proceed.
/// Kept as a thin, named wrapper so callers read as "execute if approved".
pub fn execute_if_approved(
    mode: CapabilitiesMode,
    run_id: &str,
    op: GatedOperation,
    patch_hash: &str,
    approval: Option<&Approval>,
) -> Result<()> {
    check_approval(mode, run_id, op, patch_hash, approval)
}
