use aion_core::MetricsProbe;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackConditionKind {
    ErrorRate,
    ResponseTime,
    HealthCheck,
    Throughput,
    ResourceUsage,
    UserSatisfaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackCondition {
    pub kind: RollbackConditionKind,
    pub threshold: f64,
    pub duration_secs: u64,
    pub enabled: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackStrategy {
    Immediate,
    Gradual,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackStepKind {
    SwitchTrafficBack,
    RestoreConfiguration,
    ValidateRollback,
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    pub order: u32,
    pub kind: RollbackStepKind,
    pub critical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub conditions: Vec<RollbackCondition>,
    pub strategy: RollbackStrategy,
    pub automatic_trigger: bool,
    pub backup_version: String,
    pub steps: Vec<RollbackStep>,
}

impl RollbackPlan {
    pub fn standard(backup_version: impl Into<String>) -> Self {
        Self {
            conditions: vec![
                RollbackCondition {
                    kind: RollbackConditionKind::ErrorRate,
                    threshold: 0.05,
                    duration_secs: 60,
                    enabled: true,
                    severity: Severity::Critical,
                },
                RollbackCondition {
                    kind: RollbackConditionKind::ResponseTime,
                    threshold: 5000.0,
                    duration_secs: 180,
                    enabled: true,
                    severity: Severity::High,
                },
                RollbackCondition {
                    kind: RollbackConditionKind::HealthCheck,
                    threshold: 0.0,
                    duration_secs: 0,
                    enabled: true,
                    severity: Severity::Critical,
                },
            ],
            strategy: RollbackStrategy::Immediate,
            automatic_trigger: true,
            backup_version: backup_version.into(),
            steps: vec![
                RollbackStep { order: 0, kind: RollbackStepKind::SwitchTrafficBack, critical: true },
                RollbackStep { order: 1, kind: RollbackStepKind::RestoreConfiguration, critical: true },
                RollbackStep { order: 2, kind: RollbackStepKind::ValidateRollback, critical: false },
                RollbackStep { order: 3, kind: RollbackStepKind::Notify, critical: false },
            ],
        }
    }
}

/// Evaluates every enabled condition against the `MetricsProbe` and returns
/// the first one that fires, if any. Conditions are evaluated in
/// declaration order so results are deterministic for a given probe.
pub async fn first_firing_condition<'a>(
    conditions: &'a [RollbackCondition],
    probe: &dyn MetricsProbe,
    environment: &str,
    last_health_healthy: Option<bool>,
) -> anyhow::Result<Option<&'a RollbackCondition>> {
    for condition in conditions.iter().filter(|c| c.enabled) {
        let fires = match condition.kind {
            RollbackConditionKind::ErrorRate => probe.error_rate(environment).await? > condition.threshold,
            RollbackConditionKind::ResponseTime => {
                probe.response_time_ms(environment).await? > condition.threshold
            }
            RollbackConditionKind::HealthCheck => last_health_healthy == Some(false),
            RollbackConditionKind::Throughput => probe.throughput(environment).await? > condition.threshold,
            RollbackConditionKind::ResourceUsage => {
                probe.resource_usage(environment).await? > condition.threshold
            }
            RollbackConditionKind::UserSatisfaction => {
                probe.user_satisfaction(environment).await? > condition.threshold
            }
        };
        if fires {
            return Ok(Some(condition));
        }
    }
    Ok(None)
}
