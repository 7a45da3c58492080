use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentKind {
    Production,
    Staging,
    Development,
    Canary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentStatus {
    Active,
    Inactive,
    Deploying,
    Failed,
    RollingBack,
}

/// Registered deployment target. Invariant enforced by the orchestrator: at
/// most one `DeploymentSession` with this environment name may be in
/// `pending`/`running` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub kind: EnvironmentKind,
    pub version: String,
    pub traffic_weight: u8,
    pub status: EnvironmentStatus,
    pub health_endpoints: Vec<String>,
    pub last_deployment: Option<String>,
}

impl Environment {
    pub fn new(name: impl Into<String>, kind: EnvironmentKind, health_endpoints: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: String::new(),
            traffic_weight: 0,
            status: EnvironmentStatus::Active,
            health_endpoints,
            last_deployment: None,
        }
    }
}
