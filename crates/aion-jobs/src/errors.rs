use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid job state for this operation: {0}")]
    InvalidState(String),

    #[error("job already exists: {0}")]
    AlreadyExists(String),
}

impl From<JobError> for aion_core::CoreError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(m) => aion_core::CoreError::NotFound(m),
            JobError::InvalidState(m) => aion_core::CoreError::InvalidState(m),
            JobError::AlreadyExists(m) => aion_core::CoreError::ValidationFailed(m),
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
