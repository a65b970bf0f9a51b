//! The run index (D, spec §4.4): a queryable projection over runs, kept in
//! sync with the authoritative `run.json` bundles the artifact store
//! writes. `sync_from_bundles` lets an operator rebuild the index from
//! scratch after loss or corruption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIndexEntry {
    pub run_id: String,
    pub tenant_id: String,
    pub repo_full_name: String,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RunIndexFilter {
    pub repo_full_name: Option<String>,
    pub state: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[async_trait]
pub trait RunIndex: Send + Sync {
    async fn put(&self, entry: RunIndexEntry) -> StorageResult<()>;
    async fn get(&self, run_id: &str) -> StorageResult<Option<RunIndexEntry>>;
    /// Ordered by `updated_at` descending, then filtered and paginated.
    async fn list(&self, filter: RunIndexFilter) -> StorageResult<Vec<RunIndexEntry>>;
    async fn delete(&self, run_id: &str) -> StorageResult<()>;
    /// Replace the index contents with `entries`, as rebuilt by a caller
    /// that scanned the artifact store's bundles.
    async fn sync_from_bundles(&self, entries: Vec<RunIndexEntry>) -> StorageResult<()>;
}

pub(crate) fn apply_filter(mut entries: Vec<RunIndexEntry>, filter: &RunIndexFilter) -> Vec<RunIndexEntry> {
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    if let Some(repo) = &filter.repo_full_name {
        entries.retain(|e| &e.repo_full_name == repo);
    }
    if let Some(state) = &filter.state {
        entries.retain(|e| &e.state == state);
    }
    let offset = filter.offset.unwrap_or(0);
    entries = entries.into_iter().skip(offset).collect();
    if let Some(limit) = filter.limit {
        entries.truncate(limit);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(run_id: &str, repo: &str, state: &str, updated_at: DateTime<Utc>) -> RunIndexEntry {
        RunIndexEntry {
            run_id: run_id.to_string(),
            tenant_id: "tenant-a".to_string(),
            repo_full_name: repo.to_string(),
            state: state.to_string(),
            updated_at,
        }
    }

    #[test]
    fn orders_by_updated_at_descending() {
        let t0 = Utc::now();
        let entries = vec![
            entry("run-1", "acme/widget", "done", t0),
            entry("run-2", "acme/widget", "applying", t0 + chrono::Duration::seconds(5)),
        ];
        let sorted = apply_filter(entries, &RunIndexFilter::default());
        assert_eq!(sorted[0].run_id, "run-2");
        assert_eq!(sorted[1].run_id, "run-1");
    }

    #[test]
    fn filters_by_repo_and_state_then_paginates() {
        let t0 = Utc::now();
        let entries = vec![
            entry("run-1", "acme/widget", "done", t0),
            entry("run-2", "acme/widget", "applying", t0 + chrono::Duration::seconds(1)),
            entry("run-3", "acme/gadget", "applying", t0 + chrono::Duration::seconds(2)),
        ];
        let filtered = apply_filter(
            entries,
            &RunIndexFilter {
                repo_full_name: Some("acme/widget".to_string()),
                state: Some("applying".to_string()),
                limit: None,
                offset: None,
            },
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].run_id, "run-2");
    }

    #[test]
    fn limit_and_offset_paginate_after_sorting() {
        let t0 = Utc::now();
        let entries = vec![
            entry("run-1", "acme/widget", "done", t0),
            entry("run-2", "acme/widget", "done", t0 + chrono::Duration::seconds(1)),
            entry("run-3", "acme/widget", "done", t0 + chrono::Duration::seconds(2)),
        ];
        let page = apply_filter(
            entries,
            &RunIndexFilter {
                repo_full_name: None,
                state: None,
                limit: Some(1),
                offset: Some(1),
            },
        );
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].run_id, "run-2");
    }
}
