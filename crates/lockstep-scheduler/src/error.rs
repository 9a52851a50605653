use lockstep_lock::LockError;
use thiserror::Error;

/// Errors surfaced synchronously by the scheduler API.
///
/// Tick-time failures never appear here: contention and store outages skip
/// the tick, and job-body errors go to the engine's own error log.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The interval definition is missing a unit, is zero, or overflows.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Job identity or lock expiry rejected at registration.
    #[error("Invalid job {identity:?}: {reason}")]
    InvalidJob { identity: String, reason: String },

    /// Another job on this scheduler already uses the identity.
    #[error("Job already registered: {identity}")]
    DuplicateJob { identity: String },

    /// The lock store could not be reached while constructing the scheduler.
    #[error("Lock store connection failed: {0}")]
    Connection(#[source] LockError),
}

impl SchedulerError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            SchedulerError::InvalidJob { .. } => "INVALID_JOB",
            SchedulerError::DuplicateJob { .. } => "DUPLICATE_JOB",
            SchedulerError::Connection(_) => "CONNECTION_ERROR",
        }
    }

    /// Every variant except `Connection` is a configuration mistake by the caller.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, SchedulerError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
