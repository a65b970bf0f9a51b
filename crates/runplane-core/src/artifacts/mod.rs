//! The artifact store (A, spec §4.1, §6.1).
//!
//! A content-addressable-flavored, per-run directory of named artifacts:
//! `run.json`, `triage.json`, `plan.md`, `patch.diff`, `review.json`,
//! `audit.log`. Writes are atomic (temp-then-rename); a missing run or
//! artifact surfaces as [`crate::domain::RunplaneError::ArtifactNotFound`],
//! never a partial read.

pub mod fs;

use async_trait::async_trait;
use runplane_store::run_index::{RunIndex, RunIndexEntry};

use crate::domain::Result;
use crate::run_context::RUN_ARTIFACT_NAME;
use crate::Run;

/// `sha256:<hex>` content hash of an artifact's exact bytes (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHash(String);

impl ArtifactHash {
    pub fn compute(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-run, named-artifact content store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Ensure the bundle directory for `run_id` exists. Idempotent.
    async fn ensure_run(&self, run_id: &str) -> Result<()>;

    /// Atomically write `data` under `name` in `run_id`'s bundle,
    /// overwriting any prior content for that name.
    async fn write(&self, run_id: &str, name: &str, data: &[u8]) -> Result<()>;

    /// Read the exact bytes of `name`. `ArtifactNotFound` if absent.
    async fn read(&self, run_id: &str, name: &str) -> Result<Vec<u8>>;

    /// Whether `name` exists in `run_id`'s bundle.
    async fn exists(&self, run_id: &str, name: &str) -> Result<bool>;

    /// List artifact names present in `run_id`'s bundle.
    async fn list(&self, run_id: &str) -> Result<Vec<String>>;

    /// `sha256:<hex>` of the current bytes stored under `name`.
    async fn hash(&self, run_id: &str, name: &str) -> Result<ArtifactHash>;

    /// Remove a run's entire bundle directory.
    async fn delete(&self, run_id: &str) -> Result<()>;

    /// List run ids that have a bundle directory.
    async fn list_runs(&self) -> Result<Vec<String>>;
}

/// Convenience helper: write a JSON-serializable value as an artifact.
pub async fn write_json<T: serde::Serialize + Sync>(
    store: &dyn ArtifactStore,
    run_id: &str,
    name: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.write(run_id, name, &bytes).await
}

#[cfg(test)]
mod tests {
    use runplane_store::fakes::MemoryRunIndex;
    use runplane_store::RunIndex;

    use super::*;
    use crate::artifacts::fs::FsArtifactStore;
    use crate::domain::{NewRun, RepoDescriptor};

    fn repo() -> RepoDescriptor {
        RepoDescriptor {
            owner: "acme".into(),
            name: "project".into(),
            full_name: "acme/project".into(),
            pr_url: None,
            base_ref: None,
            head_ref: None,
        }
    }

    #[tokio::test]
    async fn sync_run_index_derives_entries_from_bundled_run_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        let run = Run::new(
            "run-1".into(),
            NewRun {
                repo: repo(),
                initiator: "dev@acme.com".into(),
                tenant_id: "tenant-a".into(),
                capabilities_mode: None,
                models: None,
            },
        );
        write_json(&store, &run.run_id, RUN_ARTIFACT_NAME, &run).await.unwrap();

        let index = MemoryRunIndex::new();
        let synced = sync_run_index(&store, &index).await.unwrap();
        assert_eq!(synced, 1);

        let entry = index.get("run-1").await.unwrap().unwrap();
        assert_eq!(entry.tenant_id, "tenant-a");
        assert_eq!(entry.repo_full_name, "acme/project");
        assert_eq!(entry.state, "queued");
    }

    #[tokio::test]
    async fn sync_run_index_skips_bundles_missing_run_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.ensure_run("run-orphan").await.unwrap();

        let index = MemoryRunIndex::new();
        let synced = sync_run_index(&store, &index).await.unwrap();
        assert_eq!(synced, 0);
    }
}

/// Convenience helper: read and deserialize a JSON artifact.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    store: &dyn ArtifactStore,
    run_id: &str,
    name: &str,
) -> Result<T> {
    let bytes = store.read(run_id, name).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Rebuild `index` from `store`'s bundles (spec §4.4's `syncFromBundles`):
/// list every bundled run, read its `run.json`, and replace the index
/// contents with the derived entries. A bundle whose `run.json` can't be
/// read is skipped rather than failing the whole sync.
pub async fn sync_run_index(store: &dyn ArtifactStore, index: &dyn RunIndex) -> Result<usize> {
    let run_ids = store.list_runs().await?;
    let mut entries = Vec::with_capacity(run_ids.len());
    for run_id in run_ids {
        let run: Run = match read_json(store, &run_id, RUN_ARTIFACT_NAME).await {
            Ok(run) => run,
            Err(_) => continue,
        };
        entries.push(RunIndexEntry {
            run_id: run.run_id,
            tenant_id: run.tenant_id,
            repo_full_name: run.repo.full_name,
            state: run.state.as_str().to_string(),
            updated_at: run.updated_at,
        });
    }
    let synced = entries.len();
    index.sync_from_bundles(entries).await?;
    Ok(synced)
}
