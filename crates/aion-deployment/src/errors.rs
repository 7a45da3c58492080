use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    #[error("environment not registered: {0}")]
    EnvironmentMissing(String),

    #[error("environment already deploying: {0}")]
    EnvironmentBusy(String),

    #[error("unknown deployment strategy: {0}")]
    InvalidStrategy(String),

    #[error("deployment session not found: {0}")]
    SessionNotFound(String),

    #[error("collaborator capability failed: {0}")]
    CapabilityError(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<DeploymentError> for aion_core::CoreError {
    fn from(err: DeploymentError) -> Self {
        match err {
            DeploymentError::EnvironmentMissing(m) => aion_core::CoreError::NotFound(m),
            DeploymentError::EnvironmentBusy(m) => aion_core::CoreError::ResourceBusy(m),
            DeploymentError::InvalidStrategy(m) => aion_core::CoreError::ValidationFailed(m),
            DeploymentError::SessionNotFound(m) => aion_core::CoreError::NotFound(m),
            DeploymentError::CapabilityError(m) => aion_core::CoreError::CapabilityError(m),
            DeploymentError::Cancelled => aion_core::CoreError::Cancelled,
        }
    }
}

pub type DeploymentResult<T> = Result<T, DeploymentError>;
