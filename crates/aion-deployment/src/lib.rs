pub mod environment;
pub mod errors;
pub mod orchestrator;
pub mod rollback;
pub mod session;
pub mod strategy;

pub use environment::{Environment, EnvironmentKind, EnvironmentStatus};
pub use errors::{DeploymentError, DeploymentResult};
pub use orchestrator::{DeploymentOrchestrator, OrchestratorConfig};
pub use rollback::{
    first_firing_condition, RollbackCondition, RollbackConditionKind, RollbackPlan,
    RollbackStep, RollbackStepKind, RollbackStrategy, Severity,
};
pub use session::{
    Action, ActionOutcome, ActionStatus, ActionType, DeploymentSession, DeploymentStrategyKind,
    SessionMetrics, SessionStatus, Stage, StageStatus,
};
