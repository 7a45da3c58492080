use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rollback::RollbackPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStrategyKind {
    BlueGreen,
    Canary,
    Rolling,
    Recreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Backup,
    Deploy,
    HealthCheck,
    TrafficSwitch,
    Validation,
    Notification,
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Success,
    Failure,
    Warning,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub max_retries: u32,
    pub result: Option<ActionOutcome>,
    pub error: Option<String>,
}

impl Action {
    pub fn new(action_type: ActionType, max_retries: u32) -> Self {
        Self {
            action_type,
            status: ActionStatus::Pending,
            max_retries,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub status: StageStatus,
    pub actions: Vec<Action>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Stage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            actions,
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub failure_rate: f64,
    pub last_health_results_healthy: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSession {
    pub id: String,
    pub strategy: DeploymentStrategyKind,
    pub status: SessionStatus,
    pub version: String,
    pub environment: String,
    pub progress: u8,
    pub stages: Vec<Stage>,
    pub rollback_plan: RollbackPlan,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub metrics: SessionMetrics,
}

impl DeploymentSession {
    /// Recomputes `progress` from completed vs. total stages.
    pub fn recompute_progress(&mut self) {
        if self.stages.is_empty() {
            self.progress = 100;
            return;
        }
        let completed = self
            .stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Completed | StageStatus::Skipped))
            .count();
        self.progress = ((completed as f64 / self.stages.len() as f64) * 100.0) as u8;
    }
}
