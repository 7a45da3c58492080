use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aion_core::AIProvider;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::warn;

use crate::errors::{OptimizerError, OptimizerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ParallelJob {
    pub id: String,
    pub job_type: String,
    pub content: String,
    pub priority: u8,
    pub status: ParallelJobStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub worker_id: Option<usize>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub id: usize,
    pub status: WorkerStatus,
    pub current_job: Option<String>,
    pub jobs_processed: u64,
}

/// Fixed pool of workers pulling from a bounded channel. `submit` fails
/// synchronously with `QueueFull` rather than blocking the caller when the
/// channel is saturated.
pub struct ParallelProcessor {
    jobs: Arc<RwLock<HashMap<String, ParallelJob>>>,
    workers: Arc<RwLock<Vec<Worker>>>,
    sender: mpsc::Sender<String>,
}

impl ParallelProcessor {
    pub fn new(worker_count: usize, queue_capacity: usize, provider: Arc<dyn AIProvider>) -> Self {
        let jobs: Arc<RwLock<HashMap<String, ParallelJob>>> = Arc::new(RwLock::new(HashMap::new()));
        let (sender, receiver) = mpsc::channel::<String>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = Arc::new(RwLock::new(
            (0..worker_count).map(|id| Worker { id, status: WorkerStatus::Idle, current_job: None, jobs_processed: 0 }).collect(),
        ));

        for worker_id in 0..worker_count {
            let jobs = jobs.clone();
            let workers = workers.clone();
            let receiver = receiver.clone();
            let provider = provider.clone();
            tokio::spawn(async move {
                loop {
                    let job_id = {
                        let mut receiver = receiver.lock().await;
                        match receiver.recv().await {
                            Some(id) => id,
                            None => break,
                        }
                    };

                    {
                        let mut workers = workers.write().await;
                        workers[worker_id].status = WorkerStatus::Busy;
                        workers[worker_id].current_job = Some(job_id.clone());
                    }

                    let (job_type, content) = {
                        let mut jobs = jobs.write().await;
                        let Some(job) = jobs.get_mut(&job_id) else { continue };
                        job.status = ParallelJobStatus::Processing;
                        job.worker_id = Some(worker_id);
                        (job.job_type.clone(), job.content.clone())
                    };

                    let started = std::time::Instant::now();
                    let outcome = provider.invoke(&job_type, &content, &Value::Null).await;
                    let duration_ms = started.elapsed().as_millis() as u64;

                    {
                        let mut jobs = jobs.write().await;
                        if let Some(job) = jobs.get_mut(&job_id) {
                            job.duration_ms = Some(duration_ms);
                            match outcome {
                                Ok(result) => {
                                    job.status = ParallelJobStatus::Completed;
                                    job.result = Some(result);
                                }
                                Err(e) => {
                                    warn!(job_id, error = %e, "parallel job failed");
                                    job.status = ParallelJobStatus::Failed;
                                    job.error = Some(e.to_string());
                                }
                            }
                        }
                    }

                    let mut workers = workers.write().await;
                    workers[worker_id].status = WorkerStatus::Idle;
                    workers[worker_id].current_job = None;
                    workers[worker_id].jobs_processed += 1;
                }
            });
        }

        Self { jobs, workers, sender }
    }

    pub async fn submit(&self, job_type: impl Into<String>, content: impl Into<String>, priority: u8) -> OptimizerResult<String> {
        let id = uuid_like_id();
        let job = ParallelJob {
            id: id.clone(),
            job_type: job_type.into(),
            content: content.into(),
            priority,
            status: ParallelJobStatus::Pending,
            result: None,
            error: None,
            worker_id: None,
            duration_ms: None,
        };
        self.jobs.write().await.insert(id.clone(), job);

        match self.sender.try_send(id.clone()) {
            Ok(()) => Ok(id),
            Err(_) => {
                if let Some(job) = self.jobs.write().await.get_mut(&id) {
                    job.status = ParallelJobStatus::Failed;
                    job.error = Some("queue_full".to_string());
                }
                Err(OptimizerError::QueueFull)
            }
        }
    }

    pub async fn get_job(&self, id: &str) -> Option<ParallelJob> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn workers_snapshot(&self) -> Vec<Worker> {
        self.workers.read().await.clone()
    }

    /// Polls every 100ms until every listed job reaches a terminal status or
    /// the 5-minute hard timeout elapses, whichever comes first.
    pub async fn wait_for_completion(&self, ids: &[String], timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let all_terminal = {
                let jobs = self.jobs.read().await;
                ids.iter().all(|id| {
                    jobs.get(id).map(|j| matches!(j.status, ParallelJobStatus::Completed | ParallelJobStatus::Failed)).unwrap_or(true)
                })
            };
            if all_terminal {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn uuid_like_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoProvider;
    #[async_trait]
    impl AIProvider for EchoProvider {
        async fn invoke(&self, _request_type: &str, content: &str, _params: &Value) -> anyhow::Result<String> {
            Ok(format!("echo:{content}"))
        }
    }

    #[tokio::test]
    async fn submitted_job_completes_with_provider_result() {
        let processor = ParallelProcessor::new(2, 16, Arc::new(EchoProvider));
        let id = processor.submit("classify", "hello", 0).await.unwrap();
        let completed = processor.wait_for_completion(&[id.clone()], Duration::from_secs(5)).await;
        assert!(completed);
        let job = processor.get_job(&id).await.unwrap();
        assert_eq!(job.status, ParallelJobStatus::Completed);
        assert_eq!(job.result, Some("echo:hello".to_string()));
    }

    #[tokio::test]
    async fn full_queue_fails_submission_synchronously() {
        let processor = ParallelProcessor::new(0, 1, Arc::new(EchoProvider));
        processor.submit("classify", "a", 0).await.unwrap();
        let second = processor.submit("classify", "b", 0).await;
        assert!(matches!(second, Err(OptimizerError::QueueFull)));
    }
}
