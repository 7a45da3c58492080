use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    #[error("experiment not found: {0}")]
    NotFound(String),

    #[error("invalid experiment state for this operation: {0}")]
    InvalidState(String),

    #[error("experiment validation failed: {0}")]
    ValidationFailed(String),

    #[error("user not assigned to experiment: {0}")]
    UserNotAssigned(String),
}

impl From<ExperimentError> for aion_core::CoreError {
    fn from(err: ExperimentError) -> Self {
        match err {
            ExperimentError::NotFound(m) => aion_core::CoreError::NotFound(m),
            ExperimentError::InvalidState(m) => aion_core::CoreError::InvalidState(m),
            ExperimentError::ValidationFailed(m) => aion_core::CoreError::ValidationFailed(m),
            ExperimentError::UserNotAssigned(m) => aion_core::CoreError::InvalidState(m),
        }
    }
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;
