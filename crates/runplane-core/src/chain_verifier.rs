//! The hash-chained audit verifier (L, spec §4.12).
//!
//! Pure over whatever entries [`runplane_store::HashChainStore`] returns —
//! it recomputes hashes and compares, so it catches a backend that's lying
//! about its own integrity. [`crate::run_context`] and `runplane-cli`'s
//! `audit verify`/`audit health`/`audit is-valid` surface call this.

use chrono::{DateTime, Utc};
use runplane_store::hash_chain::{compute_content_hash, compute_prev_hash, genesis_prev_hash, HashChainEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Gap,
    HashMismatch,
    ChainBreak,
    TimestampSkew,
    AlgorithmAdvisory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub sequence: u64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStats {
    pub total_entries: u64,
    pub entries_verified: u64,
    pub sequence_range: Option<(u64, u64)>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub continuity_percent: f32,
    pub gaps_detected: u64,
    pub missing_entries: u64,
    pub algorithms_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub tenant_id: String,
    pub verified_at: DateTime<Utc>,
    pub valid: bool,
    pub summary: String,
    pub stats: VerificationStats,
    pub issues: Vec<Issue>,
    pub entry_details: Option<Vec<HashChainEntry>>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub verify_timestamps: bool,
    pub include_entry_details: bool,
    pub stop_on_first_error: bool,
}

/// Verify `entries` (already fetched for the requested window, in
/// ascending sequence order) for a tenant (spec §4.12).
pub fn verify(tenant_id: &str, entries: &[HashChainEntry], options: &VerifyOptions, now: DateTime<Utc>) -> VerificationReport {
    let mut issues = Vec::new();
    let mut algorithms_used = std::collections::BTreeSet::new();
    let mut gaps_detected = 0u64;
    let mut missing_entries = 0u64;
    let mut entries_verified = 0u64;

    let mut expected_sequence: Option<u64> = None;
    let mut prev_entry: Option<&HashChainEntry> = None;
    // The prior entry's *recomputed* content hash, not its stored field, so
    // a falsified `content_hash` still cascades into a chain break here.
    let mut prev_content_hash: Option<String> = None;

    for entry in entries {
        algorithms_used.insert(entry.algorithm.to_string());

        if let Some(expected) = expected_sequence {
            if entry.sequence != expected {
                let gap = entry.sequence.saturating_sub(expected);
                gaps_detected += 1;
                missing_entries += gap;
                issues.push(Issue {
                    severity: Severity::High,
                    issue_type: IssueType::Gap,
                    sequence: entry.sequence,
                    detail: format!("expected sequence {expected}, found {}", entry.sequence),
                });
                if options.stop_on_first_error {
                    break;
                }
            }
        }
        expected_sequence = Some(entry.sequence + 1);

        let recomputed_content = compute_content_hash(&entry.payload);
        if recomputed_content != entry.content_hash {
            issues.push(Issue {
                severity: Severity::Critical,
                issue_type: IssueType::HashMismatch,
                sequence: entry.sequence,
                detail: "content hash does not match recomputed payload hash".to_string(),
            });
            if options.stop_on_first_error {
                break;
            }
        }

        let expected_prev = match (prev_entry, &prev_content_hash) {
            (None, _) => genesis_prev_hash(),
            (Some(prior), Some(content_hash)) => compute_prev_hash(content_hash, &prior.prev_hash),
            (Some(_), None) => unreachable!("prev_content_hash is set whenever prev_entry is"),
        };
        if expected_prev != entry.prev_hash {
            issues.push(Issue {
                severity: Severity::Critical,
                issue_type: IssueType::ChainBreak,
                sequence: entry.sequence,
                detail: "prev_hash does not chain from the prior entry".to_string(),
            });
            if options.stop_on_first_error {
                break;
            }
        }

        if options.verify_timestamps {
            if let Some(prior) = prev_entry {
                if entry.timestamp + chrono::Duration::seconds(1) < prior.timestamp {
                    issues.push(Issue {
                        severity: Severity::Medium,
                        issue_type: IssueType::TimestampSkew,
                        sequence: entry.sequence,
                        detail: "timestamp regressed beyond 1 second tolerance".to_string(),
                    });
                }
            }
        }

        entries_verified += 1;
        prev_entry = Some(entry);
        prev_content_hash = Some(recomputed_content);
    }

    if algorithms_used.len() > 1 {
        issues.push(Issue {
            severity: Severity::Low,
            issue_type: IssueType::AlgorithmAdvisory,
            sequence: entries.last().map(|e| e.sequence).unwrap_or(0),
            detail: "chain uses more than one hashing algorithm".to_string(),
        });
    }

    let sequence_range = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => Some((first.sequence, last.sequence)),
        _ => None,
    };
    let time_range = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
        _ => None,
    };

    let expected_total = sequence_range.map(|(s, e)| e - s + 1).unwrap_or(0);
    let continuity_percent = if expected_total == 0 {
        100.0
    } else {
        (entries_verified as f32 / expected_total as f32) * 100.0
    };

    let valid = issues.iter().all(|i| !matches!(i.severity, Severity::Critical | Severity::High));

    let summary = if valid {
        "chain is intact".to_string()
    } else {
        format!("{} issue(s) detected", issues.len())
    };

    VerificationReport {
        tenant_id: tenant_id.to_string(),
        verified_at: now,
        valid,
        summary,
        stats: VerificationStats {
            total_entries: entries.len() as u64,
            entries_verified,
            sequence_range,
            time_range,
            continuity_percent,
            gaps_detected,
            missing_entries,
            algorithms_used: algorithms_used.into_iter().collect(),
        },
        issues,
        entry_details: options.include_entry_details.then(|| entries.to_vec()),
    }
}

/// Fast boolean shortcut over [`verify`].
pub fn is_chain_valid(tenant_id: &str, entries: &[HashChainEntry], now: DateTime<Utc>) -> bool {
    verify(tenant_id, entries, &VerifyOptions::default(), now).valid
}
