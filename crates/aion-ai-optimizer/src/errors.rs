use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum OptimizerError {
    #[error("provider invocation failed: {0}")]
    ProviderFailed(String),

    #[error("parallel queue is full")]
    QueueFull,

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<OptimizerError> for aion_core::CoreError {
    fn from(err: OptimizerError) -> Self {
        match err {
            OptimizerError::ProviderFailed(m) => aion_core::CoreError::CapabilityError(m),
            OptimizerError::QueueFull => aion_core::CoreError::ResourceBusy("parallel queue full".to_string()),
            OptimizerError::JobNotFound(m) => aion_core::CoreError::NotFound(m),
            OptimizerError::Cancelled => aion_core::CoreError::Cancelled,
        }
    }
}

pub type OptimizerResult<T> = Result<T, OptimizerError>;
