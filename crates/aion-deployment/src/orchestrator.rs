//! Deployment orchestrator: strategy-parameterised stage/action pipeline
//! with rollback triggers, backup coupling and traffic weighting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aion_core::{
    BackupService, Event, EventSink, HealthProbe, HealthState, MetricsProbe,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::environment::{Environment, EnvironmentStatus};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::rollback::{first_firing_condition, RollbackStepKind};
use crate::session::{
    Action, ActionOutcome, ActionStatus, ActionType, DeploymentSession, DeploymentStrategyKind,
    SessionStatus, Stage, StageStatus,
};
use crate::strategy::build_stages;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base retry delay; the actual wait is `retry_delay * (attempt + 1)`.
    pub retry_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { retry_delay: Duration::from_millis(20) }
    }
}

struct ActionExec {
    outcome: ActionOutcome,
    error: Option<String>,
    health_all_healthy: Option<bool>,
}

#[derive(Clone)]
pub struct DeploymentOrchestrator {
    environments: Arc<RwLock<HashMap<String, Environment>>>,
    sessions: Arc<RwLock<HashMap<String, DeploymentSession>>>,
    history: Arc<RwLock<Vec<DeploymentSession>>>,
    cancel_flags: Arc<RwLock<HashMap<String, Arc<RwLock<bool>>>>>,
    health_probe: Arc<dyn HealthProbe>,
    backup_service: Arc<dyn BackupService>,
    metrics_probe: Arc<dyn MetricsProbe>,
    event_sink: Arc<dyn EventSink>,
    config: OrchestratorConfig,
}

impl DeploymentOrchestrator {
    pub fn new(
        health_probe: Arc<dyn HealthProbe>,
        backup_service: Arc<dyn BackupService>,
        metrics_probe: Arc<dyn MetricsProbe>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_config(health_probe, backup_service, metrics_probe, event_sink, OrchestratorConfig::default())
    }

    pub fn with_config(
        health_probe: Arc<dyn HealthProbe>,
        backup_service: Arc<dyn BackupService>,
        metrics_probe: Arc<dyn MetricsProbe>,
        event_sink: Arc<dyn EventSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            environments: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
            cancel_flags: Arc::new(RwLock::new(HashMap::new())),
            health_probe,
            backup_service,
            metrics_probe,
            event_sink,
            config,
        }
    }

    /// Idempotent: registering the same name twice leaves the existing
    /// environment untouched.
    pub async fn register_environment(&self, env: Environment) -> DeploymentResult<()> {
        let mut environments = self.environments.write().await;
        environments.entry(env.name.clone()).or_insert(env);
        Ok(())
    }

    pub async fn get_environment(&self, name: &str) -> Option<Environment> {
        self.environments.read().await.get(name).cloned()
    }

    pub async fn start_deployment(
        &self,
        version: String,
        environment_name: String,
        strategy: DeploymentStrategyKind,
    ) -> DeploymentResult<DeploymentSession> {
        {
            let mut environments = self.environments.write().await;
            let env = environments
                .get_mut(&environment_name)
                .ok_or_else(|| DeploymentError::EnvironmentMissing(environment_name.clone()))?;
            if env.status == EnvironmentStatus::Deploying {
                return Err(DeploymentError::EnvironmentBusy(environment_name.clone()));
            }
            env.status = EnvironmentStatus::Deploying;
        }

        let backup_version = self
            .environments
            .read()
            .await
            .get(&environment_name)
            .map(|e| e.version.clone())
            .unwrap_or_default();

        let id = format!(
            "deploy_{version}_{environment_name}_{}",
            Utc::now().timestamp()
        );
        let session = DeploymentSession {
            id: id.clone(),
            strategy,
            status: SessionStatus::Pending,
            version: version.clone(),
            environment: environment_name.clone(),
            progress: 0,
            stages: build_stages(strategy),
            rollback_plan: crate::rollback::RollbackPlan::standard(backup_version),
            start_time: Utc::now(),
            end_time: None,
            metrics: Default::default(),
        };

        self.sessions.write().await.insert(id.clone(), session.clone());
        self.cancel_flags.write().await.insert(id.clone(), Arc::new(RwLock::new(false)));

        self.event_sink.emit(Event::DeploymentStart {
            session_id: id.clone(),
            environment: environment_name,
            version,
            timestamp: Utc::now(),
        });

        let orchestrator = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move { orchestrator.run_session(run_id).await });

        Ok(session)
    }

    pub async fn get_deployment_status(&self, id: &str) -> DeploymentResult<DeploymentSession> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.clone());
        }
        self.history
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| DeploymentError::SessionNotFound(id.to_string()))
    }

    pub async fn cancel_deployment(&self, id: &str) -> DeploymentResult<()> {
        let flag = self
            .cancel_flags
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DeploymentError::SessionNotFound(id.to_string()))?;
        *flag.write().await = true;
        Ok(())
    }

    pub async fn list_history(&self) -> Vec<DeploymentSession> {
        self.history.read().await.clone()
    }

    async fn is_cancelled(&self, id: &str) -> bool {
        match self.cancel_flags.read().await.get(id) {
            Some(flag) => *flag.read().await,
            None => false,
        }
    }

    async fn run_session(self, session_id: String) {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(s) = sessions.get_mut(&session_id) {
                s.status = SessionStatus::Running;
            }
        }

        let (environment_name, strategy, rollback_plan) = {
            let sessions = self.sessions.read().await;
            let s = sessions.get(&session_id).expect("session just created");
            (s.environment.clone(), s.strategy, s.rollback_plan.clone())
        };

        let stage_count = {
            self.sessions.read().await.get(&session_id).map(|s| s.stages.len()).unwrap_or(0)
        };

        let mut last_health_healthy: Option<bool> = None;
        let mut terminal = SessionStatus::Completed;

        'stages: for stage_idx in 0..stage_count {
            if self.is_cancelled(&session_id).await {
                terminal = SessionStatus::Cancelled;
                break;
            }

            let stage_name = {
                let sessions = self.sessions.read().await;
                sessions.get(&session_id).unwrap().stages[stage_idx].name.clone()
            };

            self.set_stage_status(&session_id, stage_idx, StageStatus::Running).await;

            let actions: Vec<(ActionType, u32)> = {
                let sessions = self.sessions.read().await;
                sessions.get(&session_id).unwrap().stages[stage_idx]
                    .actions
                    .iter()
                    .map(|a| (a.action_type, a.max_retries))
                    .collect()
            };

            let mut stage_failed = false;
            for (action_idx, (action_type, max_retries)) in actions.into_iter().enumerate() {
                if self.is_cancelled(&session_id).await {
                    terminal = SessionStatus::Cancelled;
                    break 'stages;
                }
                self.set_action_status(&session_id, stage_idx, action_idx, ActionStatus::Running).await;
                let exec = self
                    .execute_action(&environment_name, action_type, strategy, &rollback_plan.backup_version)
                    .await;
                if let Some(healthy) = exec.health_all_healthy {
                    last_health_healthy = Some(healthy);
                }
                self.record_action_result(&session_id, stage_idx, action_idx, &exec).await;
                if matches!(exec.outcome, ActionOutcome::Failure) {
                    stage_failed = true;
                    break;
                }
            }

            if stage_failed {
                terminal = SessionStatus::Failed;
                break;
            }

            // Canary traffic switch loops internally toward 100%, re-evaluating
            // rollback conditions between increments.
            if stage_name == "traffic_switch" && strategy == DeploymentStrategyKind::Canary {
                loop {
                    let weight = self.environments.read().await.get(&environment_name).map(|e| e.traffic_weight).unwrap_or(100);
                    if weight >= 100 || self.is_cancelled(&session_id).await {
                        break;
                    }
                    if let Some(rolled_back) = self
                        .maybe_rollback(&session_id, &environment_name, &rollback_plan, last_health_healthy)
                        .await
                    {
                        terminal = rolled_back;
                        break 'stages;
                    }
                    self.execute_action(&environment_name, ActionType::TrafficSwitch, strategy, &rollback_plan.backup_version).await;
                }
            }

            if !self.post_validate_stage(&session_id, stage_idx, &environment_name, last_health_healthy).await {
                terminal = SessionStatus::Failed;
                break;
            }

            self.set_stage_status(&session_id, stage_idx, StageStatus::Completed).await;
            self.recompute_progress(&session_id).await;

            if let Some(rolled_back) = self
                .maybe_rollback(&session_id, &environment_name, &rollback_plan, last_health_healthy)
                .await
            {
                terminal = rolled_back;
                break;
            }
        }

        self.finalize_session(&session_id, &environment_name, terminal).await;
    }

    /// Returns `Some(final_status)` when a rollback condition fired; `None`
    /// when the pipeline should continue normally.
    async fn maybe_rollback(
        &self,
        session_id: &str,
        environment_name: &str,
        rollback_plan: &crate::rollback::RollbackPlan,
        last_health_healthy: Option<bool>,
    ) -> Option<SessionStatus> {
        let fired = first_firing_condition(
            &rollback_plan.conditions,
            &*self.metrics_probe,
            environment_name,
            last_health_healthy,
        )
        .await
        .ok()
        .flatten();

        let condition = fired?;
        if !rollback_plan.automatic_trigger {
            return None;
        }
        warn!(session_id, ?condition.kind, "rollback condition fired");
        if self.run_rollback(environment_name, rollback_plan).await {
            Some(SessionStatus::RolledBack)
        } else {
            Some(SessionStatus::Failed)
        }
    }

    async fn run_rollback(&self, environment_name: &str, plan: &crate::rollback::RollbackPlan) -> bool {
        let mut steps = plan.steps.clone();
        steps.sort_by_key(|s| s.order);
        for step in steps {
            let result = match step.kind {
                RollbackStepKind::SwitchTrafficBack => {
                    if let Some(env) = self.environments.write().await.get_mut(environment_name) {
                        env.traffic_weight = 0;
                    }
                    Ok(())
                }
                RollbackStepKind::RestoreConfiguration => {
                    match self.backup_service.restore(&plan.backup_version).await {
                        Ok(()) => {
                            if let Some(env) = self.environments.write().await.get_mut(environment_name) {
                                env.version = plan.backup_version.clone();
                            }
                            Ok(())
                        }
                        Err(e) => Err(e.to_string()),
                    }
                }
                RollbackStepKind::ValidateRollback => {
                    let endpoints = self
                        .environments
                        .read()
                        .await
                        .get(environment_name)
                        .map(|e| e.health_endpoints.clone())
                        .unwrap_or_default();
                    match self.health_probe.check(&endpoints).await {
                        Ok(results) if results.iter().all(|r| matches!(r.status, HealthState::Healthy)) => Ok(()),
                        Ok(_) => Err("rollback validation found unhealthy endpoints".to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                }
                RollbackStepKind::Notify => {
                    self.event_sink.emit(Event::Engagement {
                        subject_id: environment_name.to_string(),
                        kind: "rollback_notification".into(),
                        timestamp: Utc::now(),
                    });
                    Ok(())
                }
            };

            if let Err(e) = result {
                if step.critical {
                    warn!(environment_name, error = %e, "critical rollback step failed, aborting rollback");
                    return false;
                }
                warn!(environment_name, error = %e, "non-critical rollback step failed, continuing");
            }
        }
        true
    }

    async fn execute_action(
        &self,
        environment_name: &str,
        action_type: ActionType,
        strategy: DeploymentStrategyKind,
        version: &str,
    ) -> ActionExec {
        let max_retries = 2u32;
        let mut attempt = 0u32;
        loop {
            let outcome: Result<Option<bool>, String> = match action_type {
                ActionType::Backup => match self.backup_service.create(environment_name, version).await {
                    Ok(r) if r.success => Ok(None),
                    Ok(r) => Err(r.error.unwrap_or_else(|| "backup failed".to_string())),
                    Err(e) => Err(e.to_string()),
                },
                ActionType::HealthCheck => {
                    let endpoints = self
                        .environments
                        .read()
                        .await
                        .get(environment_name)
                        .map(|e| e.health_endpoints.clone())
                        .unwrap_or_default();
                    match self.health_probe.check(&endpoints).await {
                        Ok(results) => {
                            let all_healthy = results.iter().all(|r| matches!(r.status, HealthState::Healthy));
                            Ok(Some(all_healthy))
                        }
                        Err(e) => Err(e.to_string()),
                    }
                }
                ActionType::TrafficSwitch => {
                    let mut environments = self.environments.write().await;
                    if let Some(env) = environments.get_mut(environment_name) {
                        env.traffic_weight = match strategy {
                            DeploymentStrategyKind::Canary => (env.traffic_weight + 10).min(100),
                            _ => 100,
                        };
                    }
                    Ok(None)
                }
                ActionType::Deploy | ActionType::Validation | ActionType::Rollback => Ok(None),
                ActionType::Notification => {
                    self.event_sink.emit(Event::Engagement {
                        subject_id: environment_name.to_string(),
                        kind: "deployment_notification".into(),
                        timestamp: Utc::now(),
                    });
                    Ok(None)
                }
            };

            match outcome {
                Ok(health) => {
                    return ActionExec { outcome: ActionOutcome::Success, error: None, health_all_healthy: health };
                }
                Err(e) => {
                    if attempt >= max_retries {
                        return ActionExec { outcome: ActionOutcome::Failure, error: Some(e), health_all_healthy: None };
                    }
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
            }
        }
    }

    async fn post_validate_stage(
        &self,
        session_id: &str,
        stage_idx: usize,
        environment_name: &str,
        last_health_healthy: Option<bool>,
    ) -> bool {
        let has_health_check = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).unwrap().stages[stage_idx]
                .actions
                .iter()
                .any(|a| a.action_type == ActionType::HealthCheck)
        };
        if has_health_check && last_health_healthy != Some(true) {
            return false;
        }

        let has_traffic_switch = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).unwrap().stages[stage_idx]
                .actions
                .iter()
                .any(|a| a.action_type == ActionType::TrafficSwitch)
        };
        if has_traffic_switch {
            let weight = self.environments.read().await.get(environment_name).map(|e| e.traffic_weight).unwrap_or(0);
            if weight == 0 {
                return false;
            }
        }
        true
    }

    async fn set_stage_status(&self, session_id: &str, stage_idx: usize, status: StageStatus) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            let stage = &mut session.stages[stage_idx];
            match status {
                StageStatus::Running => stage.start_time = Some(Utc::now()),
                StageStatus::Completed | StageStatus::Failed => stage.end_time = Some(Utc::now()),
                _ => {}
            }
            stage.status = status;
        }
    }

    async fn set_action_status(&self, session_id: &str, stage_idx: usize, action_idx: usize, status: ActionStatus) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.stages[stage_idx].actions[action_idx].status = status;
        }
    }

    async fn record_action_result(&self, session_id: &str, stage_idx: usize, action_idx: usize, exec: &ActionExec) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            let action = &mut session.stages[stage_idx].actions[action_idx];
            action.status = match exec.outcome {
                ActionOutcome::Success => ActionStatus::Completed,
                _ => ActionStatus::Failed,
            };
            action.result = Some(exec.outcome);
            action.error = exec.error.clone();
            if matches!(exec.outcome, ActionOutcome::Failure) {
                session.stages[stage_idx].status = StageStatus::Failed;
            }
        }
    }

    async fn recompute_progress(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.recompute_progress();
        }
    }

    async fn finalize_session(&self, session_id: &str, environment_name: &str, status: SessionStatus) {
        let mut session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id).expect("session present at finalisation")
        };
        session.status = status;
        session.end_time = Some(Utc::now());
        if matches!(status, SessionStatus::Failed) {
            session.metrics.failure_rate = 1.0;
        }

        {
            let mut environments = self.environments.write().await;
            if let Some(env) = environments.get_mut(environment_name) {
                match status {
                    SessionStatus::Completed => {
                        env.status = EnvironmentStatus::Active;
                        env.version = session.version.clone();
                        env.last_deployment = Some(session.id.clone());
                    }
                    SessionStatus::RolledBack => {
                        env.status = EnvironmentStatus::Active;
                        env.version = session.rollback_plan.backup_version.clone();
                    }
                    SessionStatus::Failed => env.status = EnvironmentStatus::Failed,
                    SessionStatus::Cancelled => env.status = EnvironmentStatus::Active,
                    _ => {}
                }
            }
        }

        self.event_sink.emit(Event::DeploymentEnd {
            session_id: session.id.clone(),
            status: format!("{:?}", status),
            timestamp: Utc::now(),
        });

        info!(session_id = %session.id, ?status, "deployment session finalised");
        self.history.write().await.push(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_core::{BackupResult, Event, HealthResult, InMemoryEventSink};
    use async_trait::async_trait;
    use std::time::Duration as StdDuration;
    use tokio::time::sleep;

    struct AlwaysHealthy;
    #[async_trait]
    impl HealthProbe for AlwaysHealthy {
        async fn check(&self, endpoints: &[String]) -> anyhow::Result<Vec<HealthResult>> {
            Ok(endpoints
                .iter()
                .map(|e| HealthResult {
                    endpoint: e.clone(),
                    status: HealthState::Healthy,
                    response_time_ms: 10,
                    status_code: Some(200),
                    error: None,
                })
                .collect())
        }
    }

    struct AlwaysBacksUp;
    #[async_trait]
    impl BackupService for AlwaysBacksUp {
        async fn create(&self, _environment: &str, _version: &str) -> anyhow::Result<BackupResult> {
            Ok(BackupResult { success: true, backup_id: "b1".into(), size_bytes: 0, location: "mem".into(), error: None })
        }
        async fn restore(&self, _backup_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct QuietMetrics;
    #[async_trait]
    impl MetricsProbe for QuietMetrics {
        async fn error_rate(&self, _environment: &str) -> anyhow::Result<f64> {
            Ok(0.0)
        }
        async fn response_time_ms(&self, _environment: &str) -> anyhow::Result<f64> {
            Ok(50.0)
        }
        async fn throughput(&self, _environment: &str) -> anyhow::Result<f64> {
            Ok(100.0)
        }
        async fn resource_usage(&self, _environment: &str) -> anyhow::Result<f64> {
            Ok(0.1)
        }
        async fn user_satisfaction(&self, _environment: &str) -> anyhow::Result<f64> {
            Ok(0.0)
        }
    }

    fn orchestrator_with_fakes() -> (DeploymentOrchestrator, Arc<InMemoryEventSink>) {
        let sink = Arc::new(InMemoryEventSink::new());
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(AlwaysHealthy),
            Arc::new(AlwaysBacksUp),
            Arc::new(QuietMetrics),
            sink.clone(),
        );
        (orchestrator, sink)
    }

    #[tokio::test]
    async fn blue_green_deployment_completes_and_updates_environment() {
        let (orchestrator, sink) = orchestrator_with_fakes();
        orchestrator
            .register_environment(Environment::new(
                "prod",
                crate::environment::EnvironmentKind::Production,
                vec!["https://prod/health".to_string()],
            ))
            .await
            .unwrap();

        let session = orchestrator
            .start_deployment("1.2.0".into(), "prod".into(), DeploymentStrategyKind::BlueGreen)
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Pending);

        let mut final_status = None;
        for _ in 0..50 {
            sleep(StdDuration::from_millis(20)).await;
            let status = orchestrator.get_deployment_status(&session.id).await.unwrap();
            if matches!(status.status, SessionStatus::Completed | SessionStatus::Failed) {
                final_status = Some(status);
                break;
            }
        }
        let final_status = final_status.expect("deployment should terminate");
        assert_eq!(final_status.status, SessionStatus::Completed);
        assert_eq!(final_status.progress, 100);

        let env = orchestrator.get_environment("prod").await.unwrap();
        assert_eq!(env.version, "1.2.0");
        assert_eq!(env.traffic_weight, 100);
        assert_eq!(env.status, EnvironmentStatus::Active);

        let events = sink.captured();
        assert!(events.iter().any(|e| matches!(e, Event::DeploymentStart { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::DeploymentEnd { .. })));
    }

    #[tokio::test]
    async fn cannot_start_deployment_on_unregistered_environment() {
        let (orchestrator, _sink) = orchestrator_with_fakes();
        let result = orchestrator
            .start_deployment("1.0.0".into(), "ghost".into(), DeploymentStrategyKind::Recreate)
            .await;
        assert!(matches!(result, Err(DeploymentError::EnvironmentMissing(_))));
    }
}
