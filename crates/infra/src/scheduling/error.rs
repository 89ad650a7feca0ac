//! Worker lifecycle error types

use herald_domain::HeraldError;
use thiserror::Error;

use crate::errors::InfraError;

/// Errors raised while starting or stopping background workers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Worker is already running
    #[error("Worker already running")]
    AlreadyRunning,

    /// Worker is not running
    #[error("Worker not running")]
    NotRunning,

    /// The worker task did not finish within the join timeout
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The worker task panicked or was aborted
    #[error("Worker task panicked: {0}")]
    TaskPanicked(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let herald_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                HeraldError::InvalidInput(err.to_string())
            }
            SchedulerError::Timeout { .. } | SchedulerError::TaskPanicked(_) => {
                HeraldError::Internal(err.to_string())
            }
        };
        InfraError(herald_err)
    }
}

impl From<SchedulerError> for HeraldError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for worker lifecycle operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_misuse_maps_to_invalid_input() {
        let err: HeraldError = SchedulerError::AlreadyRunning.into();
        assert!(matches!(err, HeraldError::InvalidInput(_)));

        let err: HeraldError = SchedulerError::Timeout { seconds: 5 }.into();
        assert_eq!(err, HeraldError::Internal("Operation timed out after 5s".into()));
    }
}
