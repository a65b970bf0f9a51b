//! Filesystem-backed [`ArtifactStore`].
//!
//! Layout: `<base>/<runId>/<name>` (spec §6.1). Writes go to a sibling temp
//! file in the same directory, `fsync`, then rename — the rename is atomic
//! on the same filesystem, so a crash mid-write never leaves a truncated
//! artifact (testable property 3, §8).

use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use super::{ArtifactHash, ArtifactStore};
use crate::domain::{Result, RunplaneError};

pub struct FsArtifactStore {
    base: PathBuf,
}

impl FsArtifactStore {
    /// Root the store at `base`, creating it if necessary.
    pub fn new(base: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base)?;
        Ok(Self {
            base: base.as_ref().to_path_buf(),
        })
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base.join(run_id)
    }

    fn artifact_path(&self, run_id: &str, name: &str) -> PathBuf {
        self.run_dir(run_id).join(name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn ensure_run(&self, run_id: &str) -> Result<()> {
        let dir = self.run_dir(run_id);
        tokio::task::spawn_blocking(move || std::fs::create_dir_all(dir))
            .await
            .expect("blocking task panicked")?;
        Ok(())
    }

    async fn write(&self, run_id: &str, name: &str, data: &[u8]) -> Result<()> {
        let dir = self.run_dir(run_id);
        let path = self.artifact_path(run_id, name);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .expect("blocking task panicked")?;
        Ok(())
    }

    async fn read(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(run_id, name);
        let run_id = run_id.to_string();
        let name = name.to_string();
        let result = tokio::task::spawn_blocking(move || std::fs::read(&path))
            .await
            .expect("blocking task panicked");
        result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunplaneError::ArtifactNotFound { run_id, name }
            } else {
                RunplaneError::Io(e)
            }
        })
    }

    async fn exists(&self, run_id: &str, name: &str) -> Result<bool> {
        let path = self.artifact_path(run_id, name);
        Ok(tokio::task::spawn_blocking(move || path.is_file())
            .await
            .expect("blocking task panicked"))
    }

    async fn list(&self, run_id: &str) -> Result<Vec<String>> {
        let dir = self.run_dir(run_id);
        let entries = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            if !dir.exists() {
                return Ok(Vec::new());
            }
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();
            Ok(names)
        })
        .await
        .expect("blocking task panicked")?;
        Ok(entries)
    }

    async fn hash(&self, run_id: &str, name: &str) -> Result<ArtifactHash> {
        let data = self.read(run_id, name).await?;
        Ok(ArtifactHash::compute(&data))
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        let dir = self.run_dir(run_id);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            Ok(())
        })
        .await
        .expect("blocking task panicked")?;
        Ok(())
    }

    async fn list_runs(&self) -> Result<Vec<String>> {
        let base = self.base.clone();
        let runs = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut ids = Vec::new();
            for entry in std::fs::read_dir(&base)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        ids.push(name.to_string());
                    }
                }
            }
            ids.sort();
            Ok(ids)
        })
        .await
        .expect("blocking task panicked")?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let (_dir, store) = make_store();
        store.write("run-1", "plan.md", b"do the thing").await.unwrap();
        let got = store.read("run-1", "plan.md").await.unwrap();
        assert_eq!(got, b"do the thing");
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let (_dir, store) = make_store();
        store.ensure_run("run-1").await.unwrap();
        let err = store.read("run-1", "missing.json").await.unwrap_err();
        assert!(matches!(err, RunplaneError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn write_does_not_truncate_on_overwrite_failure_path() {
        let (_dir, store) = make_store();
        store.write("run-1", "patch.diff", b"v1").await.unwrap();
        store.write("run-1", "patch.diff", b"v2").await.unwrap();
        assert_eq!(store.read("run-1", "patch.diff").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn hash_is_sha256_of_exact_bytes() {
        let (_dir, store) = make_store();
        store.write("run-1", "review.json", b"{}").await.unwrap();
        let hash = store.hash("run-1", "review.json").await.unwrap();
        assert_eq!(hash, ArtifactHash::compute(b"{}"));
        assert!(hash.as_str().starts_with("sha256:"));
    }

    #[tokio::test]
    async fn list_and_list_runs() {
        let (_dir, store) = make_store();
        store.write("run-1", "plan.md", b"a").await.unwrap();
        store.write("run-1", "patch.diff", b"b").await.unwrap();
        store.write("run-2", "plan.md", b"c").await.unwrap();

        let names = store.list("run-1").await.unwrap();
        assert_eq!(names, vec!["patch.diff".to_string(), "plan.md".to_string()]);

        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs, vec!["run-1".to_string(), "run-2".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_whole_bundle() {
        let (_dir, store) = make_store();
        store.write("run-1", "plan.md", b"a").await.unwrap();
        store.delete("run-1").await.unwrap();
        assert!(!store.exists("run-1", "plan.md").await.unwrap());
        assert_eq!(store.list("run-1").await.unwrap(), Vec::<String>::new());
    }
}
