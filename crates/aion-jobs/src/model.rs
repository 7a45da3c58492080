use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Canceled,
    Partial,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled | JobStatus::Partial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    Manual,
    Scheduled,
    Webhook,
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: JobStatus,
    pub step: Option<String>,
    pub message: Option<String>,
    pub progress: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub deal_name: String,
    pub status: JobStatus,
    pub trigger_type: TriggerType,
    pub file_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub current_step: Option<String>,
    pub estimated_time: Option<i64>,
    pub total_documents: u64,
    pub processed_documents: u64,
    pub queue_position: Option<u64>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub errors: Vec<String>,
    pub history: Vec<JobHistoryEntry>,
    pub metadata: HashMap<String, Value>,
}

impl Job {
    pub fn new(id: impl Into<String>, deal_name: impl Into<String>, trigger_type: TriggerType, file_paths: Vec<String>) -> Self {
        let now = Utc::now();
        let total_documents = file_paths.len() as u64;
        Self {
            id: id.into(),
            deal_name: deal_name.into(),
            status: JobStatus::Pending,
            trigger_type,
            file_paths,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            progress: 0.0,
            current_step: None,
            estimated_time: None,
            total_documents,
            processed_documents: 0,
            queue_position: None,
            retry_count: 0,
            max_retries: 3,
            errors: Vec::new(),
            history: vec![JobHistoryEntry {
                timestamp: now,
                status: JobStatus::Pending,
                step: None,
                message: Some("job created".to_string()),
                progress: 0.0,
                error: None,
            }],
            metadata: HashMap::new(),
        }
    }
}

/// Sparse patch applied by `UpdateJob`. Only populated fields are written.
#[derive(Debug, Default, Clone)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    pub estimated_time: Option<i64>,
    pub processed_documents: Option<u64>,
    pub queue_position: Option<u64>,
    pub errors: Option<Vec<String>>,
    pub metadata: Option<HashMap<String, Value>>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct JobQuery {
    pub deal_name: Option<String>,
    pub status: Option<JobStatus>,
    pub trigger_type: Option<TriggerType>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Progress,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub counts_by_status: HashMap<String, u64>,
    pub counts_by_deal: HashMap<String, u64>,
    pub recent_history: Vec<JobHistoryEntry>,
}
