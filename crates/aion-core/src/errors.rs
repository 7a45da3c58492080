//! Error kinds shared by every control-plane component.
//!
//! Each component exposes its own `thiserror` enum for its public contract,
//! but every variant ultimately maps onto one of these kinds so that callers
//! spanning components can dispatch on error category without knowing which
//! component produced it.

use thiserror::Error;

/// Error kinds surfaced across the deployment, experiment, job and
/// AI-optimiser components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("retryable transient error: {0}")]
    RetryableTransient(String),

    #[error("collaborator capability error: {0}")]
    CapabilityError(String),

    #[error("cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;
