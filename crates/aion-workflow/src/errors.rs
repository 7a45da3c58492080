use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("no healthy endpoint available")]
    NoEndpoint,

    #[error("workflow engine call failed: {0}")]
    CapabilityError(String),

    #[error("{0} batch(es) failed: {1}")]
    BatchFailures(usize, String),
}

impl From<WorkflowError> for aion_core::CoreError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NoEndpoint => aion_core::CoreError::CapabilityError("no_endpoint".to_string()),
            WorkflowError::CapabilityError(m) => aion_core::CoreError::CapabilityError(m),
            WorkflowError::BatchFailures(_, m) => aion_core::CoreError::CapabilityError(m),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
