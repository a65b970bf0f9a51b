//! The readiness gate (P, spec §2 System Overview table; otherwise
//! unspecified in §4 — supplemented here per SPEC_FULL.md).
//!
//! A category-scored launch checklist: each [`Check`] belongs to a
//! [`Category`] and is either automated (has a pass/fail result) or
//! manually attested. [`evaluate`] aggregates per-category pass rates and a
//! single go/no-go verdict, grounded on the same rule-engine shape this
//! workspace used for its (now-removed) merge gate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Reliability,
    Security,
    Observability,
    Operations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Automated,
    ManualAttestation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub category: Category,
    pub kind: CheckKind,
    /// `None` means the check hasn't run/been attested yet.
    pub passed: Option<bool>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    pub passed: u32,
    pub total: u32,
    pub score: f32,
    pub blocking_failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub categories: Vec<CategoryResult>,
    pub overall_score: f32,
    pub go: bool,
}

/// Evaluate a checklist into a per-category breakdown and an overall
/// go/no-go. `go` is false if any `required` check is not `Some(true)`.
pub fn evaluate(checks: &[Check]) -> ReadinessReport {
    let mut by_category: BTreeMap<Category, Vec<&Check>> = BTreeMap::new();
    for check in checks {
        by_category.entry(check.category).or_default().push(check);
    }

    let mut categories = Vec::new();
    let mut go = true;

    for (category, checks) in &by_category {
        let total = checks.len() as u32;
        let passed = checks.iter().filter(|c| c.passed == Some(true)).count() as u32;
        let blocking_failures: Vec<String> = checks
            .iter()
            .filter(|c| c.required && c.passed != Some(true))
            .map(|c| c.name.clone())
            .collect();
        if !blocking_failures.is_empty() {
            go = false;
        }
        let score = if total == 0 { 0.0 } else { passed as f32 / total as f32 };
        categories.push(CategoryResult {
            category: *category,
            passed,
            total,
            score,
            blocking_failures,
        });
    }

    let overall_score = if categories.is_empty() {
        0.0
    } else {
        categories.iter().map(|c| c.score).sum::<f32>() / categories.len() as f32
    };

    ReadinessReport {
        categories,
        overall_score,
        go,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, category: Category, required: bool, passed: Option<bool>) -> Check {
        Check {
            name: name.to_string(),
            category,
            kind: CheckKind::Automated,
            passed,
            required,
        }
    }

    #[test]
    fn all_required_checks_passing_is_go() {
        let checks = vec![
            check("idempotency store reachable", Category::Reliability, true, Some(true)),
            check("circuit breakers closed", Category::Reliability, true, Some(true)),
            check("secrets scan clean", Category::Security, true, Some(true)),
        ];
        let report = evaluate(&checks);
        assert!(report.go);
        assert_eq!(report.overall_score, 1.0);
    }

    #[test]
    fn a_failing_required_check_blocks_launch() {
        let checks = vec![
            check("idempotency store reachable", Category::Reliability, true, Some(true)),
            check("secrets scan clean", Category::Security, true, Some(false)),
        ];
        let report = evaluate(&checks);
        assert!(!report.go);
        let security = report
            .categories
            .iter()
            .find(|c| c.category == Category::Security)
            .unwrap();
        assert_eq!(security.blocking_failures, vec!["secrets scan clean".to_string()]);
    }

    #[test]
    fn unattested_manual_check_is_not_a_pass() {
        let checks = vec![check("runbook reviewed", Category::Operations, true, None)];
        let report = evaluate(&checks);
        assert!(!report.go);
        assert_eq!(report.categories[0].passed, 0);
    }

    #[test]
    fn non_required_failure_does_not_block_go() {
        let checks = vec![
            check("required", Category::Reliability, true, Some(true)),
            check("nice to have", Category::Observability, false, Some(false)),
        ];
        let report = evaluate(&checks);
        assert!(report.go);
    }
}
