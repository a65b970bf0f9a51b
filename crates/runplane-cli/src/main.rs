//! Runplane operator CLI.
//!
//! The control plane itself runs as `runplane-daemon`; this binary is the
//! surface an operator or a CI job reaches for to inspect a tenant's
//! hash-chained audit log without standing up a full deployment.
//!
//! ## Commands
//!
//! - `audit verify`: full verification report over a sequence window
//! - `audit health`: condensed pass/fail summary for a dashboard or alert
//! - `audit is-valid`: boolean shortcut, script-friendly exit code

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use runplane_core::chain_verifier::{self, VerifyOptions};
use runplane_store::hash_chain::HashChainEntry;
use tracing::Level;

#[derive(Parser)]
#[command(name = "runplane")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the runplane control plane", long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a tenant's hash-chained audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Recompute and verify the full hash chain for a tenant
    Verify(AuditWindowArgs),

    /// Print a condensed health summary for a tenant's chain
    Health(AuditWindowArgs),

    /// Boolean shortcut: exit 0 if the chain is valid, 1 if not
    IsValid(AuditWindowArgs),
}

#[derive(clap::Args)]
struct AuditWindowArgs {
    /// Tenant to verify
    #[arg(long)]
    tenant: String,

    /// JSON file holding the tenant's chain entries (array of audit entries)
    #[arg(long)]
    entries_file: PathBuf,

    /// Only verify entries at or after this sequence number
    #[arg(long)]
    start_sequence: Option<u64>,

    /// Only verify entries at or before this sequence number
    #[arg(long)]
    end_sequence: Option<u64>,

    /// Cap the number of entries verified
    #[arg(long)]
    max_entries: Option<usize>,

    /// Also flag entries whose timestamp regresses beyond tolerance
    #[arg(long)]
    verify_timestamps: bool,

    /// Include full entry payloads in the report
    #[arg(long)]
    include_entries: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn load_entries(args: &AuditWindowArgs) -> Result<Vec<HashChainEntry>> {
    let raw = std::fs::read_to_string(&args.entries_file)
        .with_context(|| format!("failed to read entries file: {:?}", args.entries_file))?;
    let mut entries: Vec<HashChainEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("entries file is not a JSON array of audit entries: {:?}", args.entries_file))?;

    entries.retain(|e| e.tenant_id == args.tenant);
    entries.sort_by_key(|e| e.sequence);

    if let Some(start) = args.start_sequence {
        entries.retain(|e| e.sequence >= start);
    }
    if let Some(end) = args.end_sequence {
        entries.retain(|e| e.sequence <= end);
    }
    if let Some(max) = args.max_entries {
        entries.truncate(max);
    }

    Ok(entries)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    runplane_core::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Audit { action } => match action {
            AuditAction::Verify(args) => cmd_audit_verify(args)?,
            AuditAction::Health(args) => cmd_audit_health(args)?,
            AuditAction::IsValid(args) => cmd_audit_is_valid(args)?,
        },
    };

    std::process::exit(code);
}

fn cmd_audit_verify(args: AuditWindowArgs) -> Result<i32> {
    let entries = load_entries(&args)?;
    let options = VerifyOptions {
        verify_timestamps: args.verify_timestamps,
        include_entry_details: args.include_entries,
        stop_on_first_error: false,
    };
    let report = chain_verifier::verify(&args.tenant, &entries, &options, chrono::Utc::now());

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_verify_report_text(&report),
    }

    Ok(if report.valid {
        0
    } else if !report.issues.is_empty() {
        1
    } else {
        2
    })
}

fn print_verify_report_text(report: &chain_verifier::VerificationReport) {
    println!("Tenant:     {}", report.tenant_id);
    println!("Verified:   {}", report.verified_at.to_rfc3339());
    println!("Valid:      {}", if report.valid { "yes" } else { "no" });
    println!("Summary:    {}", report.summary);
    println!();
    println!("Entries checked:    {}", report.stats.total_entries);
    println!("Entries verified:   {}", report.stats.entries_verified);
    println!("Continuity:         {:.1}%", report.stats.continuity_percent);
    println!("Gaps detected:      {}", report.stats.gaps_detected);
    println!("Missing entries:    {}", report.stats.missing_entries);
    if let Some((start, end)) = report.stats.sequence_range {
        println!("Sequence range:     {start}..={end}");
    }
    println!("Algorithms used:    {}", report.stats.algorithms_used.join(", "));

    if !report.issues.is_empty() {
        println!("\nIssues:");
        for issue in &report.issues {
            println!(
                "  [{:?}] {:?} @ seq {}: {}",
                issue.severity, issue.issue_type, issue.sequence, issue.detail
            );
        }
    }
}

fn cmd_audit_health(args: AuditWindowArgs) -> Result<i32> {
    let entries = load_entries(&args)?;
    let options = VerifyOptions {
        verify_timestamps: args.verify_timestamps,
        include_entry_details: false,
        stop_on_first_error: false,
    };
    let report = chain_verifier::verify(&args.tenant, &entries, &options, chrono::Utc::now());

    match args.format {
        OutputFormat::Json => {
            let health = serde_json::json!({
                "tenantId": report.tenant_id,
                "valid": report.valid,
                "continuityPercent": report.stats.continuity_percent,
                "totalEntries": report.stats.total_entries,
                "issueCount": report.issues.len(),
            });
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        OutputFormat::Text => {
            println!(
                "{}: {} ({:.1}% continuity, {} issue(s) over {} entries)",
                report.tenant_id,
                if report.valid { "healthy" } else { "degraded" },
                report.stats.continuity_percent,
                report.issues.len(),
                report.stats.total_entries,
            );
        }
    }

    Ok(0)
}

fn cmd_audit_is_valid(args: AuditWindowArgs) -> Result<i32> {
    let entries = load_entries(&args)?;
    let valid = chain_verifier::is_chain_valid(&args.tenant, &entries, chrono::Utc::now());

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "tenantId": args.tenant, "valid": valid })),
        OutputFormat::Text => println!("{}", valid),
    }

    Ok(if valid { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use runplane_store::hash_chain::{compute_content_hash, compute_prev_hash, genesis_prev_hash, ChainAlgorithm};
    use serde_json::json;

    fn seed_chain(tenant: &str, n: u64) -> Vec<HashChainEntry> {
        let mut entries = Vec::new();
        let mut prev_content = String::new();
        let mut prev_prev = genesis_prev_hash();
        let base = Utc::now();
        for i in 0..n {
            let payload = json!({ "seq": i });
            let content_hash = compute_content_hash(&payload);
            let prev_hash = if i == 0 {
                genesis_prev_hash()
            } else {
                compute_prev_hash(&prev_content, &prev_prev)
            };
            entries.push(HashChainEntry {
                entry_id: format!("e{i}"),
                tenant_id: tenant.to_string(),
                sequence: i,
                timestamp: base + chrono::Duration::seconds(i as i64),
                algorithm: ChainAlgorithm::Sha256,
                prev_hash: prev_hash.clone(),
                content_hash: content_hash.clone(),
                payload,
            });
            prev_prev = prev_hash;
            prev_content = content_hash;
        }
        entries
    }

    fn write_entries(entries: &[HashChainEntry]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(entries).unwrap()).unwrap();
        file
    }

    fn window_args(file: &tempfile::NamedTempFile, tenant: &str) -> AuditWindowArgs {
        AuditWindowArgs {
            tenant: tenant.to_string(),
            entries_file: file.path().to_path_buf(),
            start_sequence: None,
            end_sequence: None,
            max_entries: None,
            verify_timestamps: false,
            include_entries: false,
            format: OutputFormat::Json,
        }
    }

    #[test]
    fn verify_exits_zero_for_honest_chain() {
        let entries = seed_chain("tenant-a", 4);
        let file = write_entries(&entries);
        let code = cmd_audit_verify(window_args(&file, "tenant-a")).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn verify_exits_one_when_issues_found() {
        let mut entries = seed_chain("tenant-a", 3);
        entries[1].payload = json!({ "seq": 999 });
        let file = write_entries(&entries);
        let code = cmd_audit_verify(window_args(&file, "tenant-a")).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn is_valid_exits_one_for_tampered_chain() {
        let mut entries = seed_chain("tenant-a", 3);
        entries[2].sequence = 9;
        let file = write_entries(&entries);
        let code = cmd_audit_is_valid(window_args(&file, "tenant-a")).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn health_always_exits_zero() {
        let mut entries = seed_chain("tenant-a", 3);
        entries[2].sequence = 9;
        let file = write_entries(&entries);
        let code = cmd_audit_health(window_args(&file, "tenant-a")).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn load_entries_filters_by_tenant_and_window() {
        let mut entries = seed_chain("tenant-a", 5);
        entries.extend(seed_chain("tenant-b", 2));
        let file = write_entries(&entries);
        let mut args = window_args(&file, "tenant-a");
        args.start_sequence = Some(1);
        args.max_entries = Some(2);
        let loaded = load_entries(&args).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|e| e.tenant_id == "tenant-a"));
        assert_eq!(loaded[0].sequence, 1);
    }
}
