//! Narrow collaborator capabilities consumed by the core.
//!
//! None of these are implemented here: production wiring supplies concrete
//! adapters (a real HTTP health prober, a Kubernetes/S3 backup service, a
//! Prometheus-backed metrics probe, a provider SDK, ...). Tests supply
//! in-memory fakes. The core only ever depends on these trait objects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub endpoint: String,
    pub status: HealthState,
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

/// `HealthProbe.Check(endpoints) -> HealthResult[]`
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, endpoints: &[String]) -> anyhow::Result<Vec<HealthResult>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResult {
    pub success: bool,
    pub backup_id: String,
    pub size_bytes: u64,
    pub location: String,
    pub error: Option<String>,
}

/// `BackupService.Create(environment, version)` / `Restore(backupId)`
#[async_trait]
pub trait BackupService: Send + Sync {
    async fn create(&self, environment: &str, version: &str) -> anyhow::Result<BackupResult>;
    async fn restore(&self, backup_id: &str) -> anyhow::Result<()>;
}

/// `MetricsProbe.ErrorRate(), ResponseTime(), ...` used by rollback-condition
/// evaluation. A faithful implementation must source these from real
/// telemetry; the reference's `rand`-driven stub is a source bug, not a
/// pattern to repeat.
#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn error_rate(&self, environment: &str) -> anyhow::Result<f64>;
    async fn response_time_ms(&self, environment: &str) -> anyhow::Result<f64>;
    async fn throughput(&self, environment: &str) -> anyhow::Result<f64>;
    async fn resource_usage(&self, environment: &str) -> anyhow::Result<f64>;
    async fn user_satisfaction(&self, environment: &str) -> anyhow::Result<f64>;
}

/// `AIProvider.Invoke(type, content, params) -> any`
#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn invoke(&self, request_type: &str, content: &str, params: &Value) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct WorkflowResponse {
    pub status: u16,
    pub body: String,
}

/// `WorkflowEngine.Post(endpoint, jsonBody, headers) -> (status, body, error)`
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        json_body: Value,
        headers: HashMap<String, String>,
    ) -> anyhow::Result<WorkflowResponse>;
}

/// Events published by deployment, experiment, job and optimiser components.
/// No cross-component ordering is implied beyond emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DeploymentStart { session_id: String, environment: String, version: String, timestamp: DateTime<Utc> },
    DeploymentEnd { session_id: String, status: String, timestamp: DateTime<Utc> },
    ExperimentStart { experiment_id: String, timestamp: DateTime<Utc> },
    ExperimentEnd { experiment_id: String, winning_variant: Option<String>, timestamp: DateTime<Utc> },
    UserAssignment { experiment_id: String, user_id: String, variant_id: String, timestamp: DateTime<Utc> },
    Conversion { experiment_id: String, user_id: String, value: f64, timestamp: DateTime<Utc> },
    Engagement { subject_id: String, kind: String, timestamp: DateTime<Utc> },
    Feedback { subject_id: String, weight: f64, timestamp: DateTime<Utc> },
    KeyCreated { key_id: String, timestamp: DateTime<Utc> },
    KeyRevoked { key_id: String, timestamp: DateTime<Utc> },
    RateLimitExceeded { subject_id: String, timestamp: DateTime<Utc> },
    Custom { event_type: String, data: Value, timestamp: DateTime<Utc> },
}

/// `EventSink.Emit(event)` — the single seam through which deployment,
/// experiment and job components publish activity, so tests can assert on
/// captured events without any I/O.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Discards every event. Useful as a default when a caller does not care.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: Event) {}
}
