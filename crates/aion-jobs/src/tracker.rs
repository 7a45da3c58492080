use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::errors::{JobError, JobResult};
use crate::model::{
    Job, JobHistoryEntry, JobQuery, JobStatus, JobSummary, JobUpdate, SortField, SortOrder,
    TriggerType,
};
use crate::persistence::{JobSnapshot, SnapshotStore};

pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    history_index: Arc<RwLock<Vec<String>>>,
    store: SnapshotStore,
}

impl JobTracker {
    /// Loads an existing snapshot from `snapshot_path` if present, otherwise
    /// starts empty.
    pub async fn new(snapshot_path: impl Into<std::path::PathBuf>) -> Self {
        let store = SnapshotStore::new(snapshot_path);
        let snapshot = store.load().await;
        Self {
            jobs: Arc::new(RwLock::new(snapshot.jobs)),
            history_index: Arc::new(RwLock::new(snapshot.history)),
            store,
        }
    }

    async fn persist(&self) {
        let snapshot = JobSnapshot {
            jobs: self.jobs.read().await.clone(),
            history: self.history_index.read().await.clone(),
            saved_at: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "failed to persist job snapshot");
        }
    }

    pub async fn create_job(
        &self,
        id: impl Into<String>,
        deal_name: impl Into<String>,
        trigger_type: TriggerType,
        file_paths: Vec<String>,
    ) -> JobResult<Job> {
        let id = id.into();
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(JobError::AlreadyExists(id));
        }
        let job = Job::new(id.clone(), deal_name, trigger_type, file_paths);
        jobs.insert(id.clone(), job.clone());
        drop(jobs);
        self.history_index.write().await.push(id);
        self.persist().await;
        Ok(job)
    }

    pub async fn update_job(&self, id: &str, update: JobUpdate) -> JobResult<Job> {
        let updated = {
            let mut jobs = self.jobs.write().await;
            let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;

            // A history entry is recorded whenever the caller explicitly sets a
            // status, even a repeat of the current one — callers re-assert status
            // alongside progress to mark a new step, and each such call is a
            // distinct, user-visible point in the job's timeline.
            let status_included = update.status.is_some();

            if let Some(status) = update.status {
                if status == JobStatus::Processing && job.started_at.is_none() {
                    job.started_at = Some(Utc::now());
                }
                if status.is_terminal() && job.completed_at.is_none() {
                    job.completed_at = Some(Utc::now());
                }
                job.status = status;
            }
            if let Some(progress) = update.progress {
                job.progress = progress;
            }
            if let Some(step) = update.current_step.clone() {
                job.current_step = Some(step);
            }
            if let Some(estimated_time) = update.estimated_time {
                job.estimated_time = Some(estimated_time);
            }
            if let Some(processed_documents) = update.processed_documents {
                job.processed_documents = processed_documents;
            }
            if let Some(queue_position) = update.queue_position {
                job.queue_position = Some(queue_position);
            }
            if let Some(errors) = update.errors.clone() {
                job.errors = errors;
            }
            if let Some(metadata) = update.metadata.clone() {
                job.metadata.extend(metadata);
            }

            job.updated_at = Utc::now();

            if status_included {
                job.history.push(JobHistoryEntry {
                    timestamp: job.updated_at,
                    status: job.status,
                    step: job.current_step.clone(),
                    message: update.message.clone(),
                    progress: job.progress,
                    error: job.errors.last().cloned(),
                });
            }

            job.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    pub async fn complete_job(&self, id: &str, processed_documents: u64) -> JobResult<Job> {
        self.update_job(
            id,
            JobUpdate {
                status: Some(JobStatus::Completed),
                progress: Some(1.0),
                processed_documents: Some(processed_documents),
                message: Some("job completed".to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn fail_job(&self, id: &str, error_message: impl Into<String>) -> JobResult<Job> {
        let message = error_message.into();
        self.update_job(
            id,
            JobUpdate {
                status: Some(JobStatus::Failed),
                errors: Some(vec![message.clone()]),
                message: Some(message),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn cancel_job(&self, id: &str) -> JobResult<Job> {
        self.update_job(
            id,
            JobUpdate { status: Some(JobStatus::Canceled), message: Some("job canceled".to_string()), ..Default::default() },
        )
        .await
    }

    pub async fn retry_job(&self, id: &str) -> JobResult<Job> {
        let updated = {
            let mut jobs = self.jobs.write().await;
            let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if job.status != JobStatus::Failed {
                return Err(JobError::InvalidState(format!("job {id} is not failed")));
            }
            if job.retry_count >= job.max_retries {
                return Err(JobError::InvalidState(format!("job {id} has exhausted its retries")));
            }
            job.retry_count += 1;
            job.status = JobStatus::Pending;
            job.progress = 0.0;
            job.current_step = None;
            job.completed_at = None;
            job.updated_at = Utc::now();
            job.history.push(JobHistoryEntry {
                timestamp: job.updated_at,
                status: job.status,
                step: None,
                message: Some(format!("retry {} of {}", job.retry_count, job.max_retries)),
                progress: 0.0,
                error: None,
            });
            job.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    pub async fn get_job(&self, id: &str) -> JobResult<Job> {
        self.jobs.read().await.get(id).cloned().ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub async fn query_jobs(&self, query: JobQuery) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| query.deal_name.as_deref().map(|d| d == j.deal_name).unwrap_or(true))
            .filter(|j| query.status.map(|s| s == j.status).unwrap_or(true))
            .filter(|j| query.trigger_type.map(|t| t == j.trigger_type).unwrap_or(true))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match query.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Progress => a.progress.partial_cmp(&b.progress).unwrap_or(std::cmp::Ordering::Equal),
            };
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let start = query.offset.min(matched.len());
        match query.limit {
            Some(limit) => matched.into_iter().skip(start).take(limit).collect(),
            None => matched.into_iter().skip(start).collect(),
        }
    }

    pub async fn get_job_summary(&self) -> JobSummary {
        let jobs = self.jobs.read().await;
        let mut counts_by_status: HashMap<String, u64> = HashMap::new();
        let mut counts_by_deal: HashMap<String, u64> = HashMap::new();
        let mut all_history: Vec<JobHistoryEntry> = Vec::new();

        for job in jobs.values() {
            *counts_by_status.entry(format!("{:?}", job.status)).or_insert(0) += 1;
            *counts_by_deal.entry(job.deal_name.clone()).or_insert(0) += 1;
            all_history.extend(job.history.iter().cloned());
        }

        all_history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all_history.truncate(50);

        JobSummary { counts_by_status, counts_by_deal, recent_history: all_history }
    }

    pub async fn cleanup_old_jobs(&self, older_than_hours: i64) -> usize {
        let cutoff: DateTime<Utc> = Utc::now() - ChronoDuration::hours(older_than_hours);
        let mut jobs = self.jobs.write().await;
        let to_remove: Vec<String> = jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Failed) && j.updated_at < cutoff)
            .map(|j| j.id.clone())
            .collect();

        for id in &to_remove {
            jobs.remove(id);
        }
        drop(jobs);

        if !to_remove.is_empty() {
            let mut history = self.history_index.write().await;
            history.retain(|id| !to_remove.contains(id));
            drop(history);
            self.persist().await;
        }

        to_remove.len()
    }
}

/// Helper for callers that only want to attach a value to job metadata
/// without constructing a full `JobUpdate`.
pub fn metadata_patch(key: impl Into<String>, value: Value) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(key.into(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker() -> (JobTracker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JobTracker::new(dir.path().join("jobs.json")).await;
        (tracker, dir)
    }

    #[tokio::test]
    async fn job_lifecycle_matches_contract() {
        let (tracker, _dir) = tracker().await;
        tracker.create_job("j1", "D", TriggerType::Manual, vec!["f1".into(), "f2".into()]).await.unwrap();

        tracker
            .update_job("j1", JobUpdate { status: Some(JobStatus::Processing), progress: Some(0.25), ..Default::default() })
            .await
            .unwrap();
        tracker
            .update_job("j1", JobUpdate { status: Some(JobStatus::Processing), progress: Some(0.75), ..Default::default() })
            .await
            .unwrap();
        let job = tracker.complete_job("j1", 2).await.unwrap();

        assert_eq!(job.history.len(), 4);
        assert_eq!(job.progress, 1.0);
        assert_eq!(job.total_documents, 2);
        assert_eq!(job.processed_documents, 2);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn retry_bound_is_enforced() {
        let (tracker, _dir) = tracker().await;
        tracker.create_job("j1", "D", TriggerType::Manual, vec![]).await.unwrap();
        tracker.fail_job("j1", "boom").await.unwrap();
        for _ in 0..3 {
            tracker.retry_job("j1").await.unwrap();
            tracker.fail_job("j1", "boom again").await.unwrap();
        }
        let err = tracker.retry_job("j1").await.unwrap_err();
        assert!(matches!(err, JobError::InvalidState(_)));
    }

    #[tokio::test]
    async fn history_entries_only_appear_when_status_is_set() {
        let (tracker, _dir) = tracker().await;
        tracker.create_job("j1", "D", TriggerType::Manual, vec![]).await.unwrap();
        tracker.update_job("j1", JobUpdate { progress: Some(0.5), ..Default::default() }).await.unwrap();
        let job = tracker.get_job("j1").await.unwrap();
        assert_eq!(job.history.len(), 1);
        assert_eq!(job.progress, 0.5);

        tracker
            .update_job("j1", JobUpdate { status: Some(JobStatus::Pending), progress: Some(0.6), ..Default::default() })
            .await
            .unwrap();
        let job = tracker.get_job("j1").await.unwrap();
        assert_eq!(job.history.len(), 2, "a repeated status still marks a new history entry");
    }
}
