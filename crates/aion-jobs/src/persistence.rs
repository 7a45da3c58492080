use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::Job;

#[derive(Debug, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub jobs: HashMap<String, Job>,
    pub history: Vec<String>,
    pub saved_at: i64,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing file → empty snapshot. Corrupt file → logged and treated as
    /// empty; construction must never fail because of a damaged snapshot.
    pub async fn load(&self) -> JobSnapshot {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<JobSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "job snapshot corrupt, starting empty");
                    empty_snapshot()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => empty_snapshot(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "job snapshot unreadable, starting empty");
                empty_snapshot()
            }
        }
    }

    /// Write-then-rename: the snapshot is written to a sibling temp file and
    /// atomically renamed over the target so a crash mid-write never leaves
    /// a truncated snapshot in place.
    pub async fn save(&self, snapshot: &JobSnapshot) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp_path = tmp_path_for(&self.path);
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn empty_snapshot() -> JobSnapshot {
    JobSnapshot { jobs: HashMap::new(), history: Vec::new(), saved_at: 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, TriggerType};

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("jobs.json"));
        let snapshot = store.load().await;
        assert!(snapshot.jobs.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let store = SnapshotStore::new(path);
        let snapshot = store.load().await;
        assert!(snapshot.jobs.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("jobs.json"));
        let mut jobs = HashMap::new();
        let job = Job::new("j1", "deal", TriggerType::Manual, vec!["f1".into()]);
        jobs.insert(job.id.clone(), job);
        let snapshot = JobSnapshot { jobs, history: vec!["j1".into()], saved_at: 123 };
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.jobs.len(), 1);
        assert_eq!(loaded.history, vec!["j1".to_string()]);
    }
}
