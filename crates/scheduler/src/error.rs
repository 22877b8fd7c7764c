//! Scheduler error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that abort a whole scheduler tick.
///
/// Failures of a single order are counted in the tick report instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The due scan could not be read.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Convenience type alias for scheduler results.
pub type Result<T> = std::result::Result<T, SchedulerError>;
