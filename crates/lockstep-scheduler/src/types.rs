use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Boxed error as seen by the trigger engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name of the lock resource a job runs under.
///
/// Every instance running the same logical job must use the same identity;
/// distinct jobs must not share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentity(pub String);

impl JobIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What happens to the lock after a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Release as soon as the job body returns.
    #[default]
    Release,
    /// Leave the lock to expire on its own. The effective period becomes
    /// `max(interval, lock_expiry)` across the whole fleet.
    KeepLocked,
}

impl RetentionPolicy {
    pub fn from_keep_locked(keep_locked: bool) -> Self {
        if keep_locked {
            RetentionPolicy::KeepLocked
        } else {
            RetentionPolicy::Release
        }
    }

    pub fn keeps_lock(self) -> bool {
        self == RetentionPolicy::KeepLocked
    }
}

/// Control parameters that travel beside the user's arguments on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParams {
    pub identity: JobIdentity,
    pub lock_expiry: Duration,
    pub retention: RetentionPolicy,
}

impl JobParams {
    /// Validate and build. An empty identity or a lock expiry below one
    /// millisecond is rejected here, before anything is scheduled.
    pub fn new(
        identity: impl Into<JobIdentity>,
        lock_expiry: Duration,
        retention: RetentionPolicy,
    ) -> Result<Self> {
        let identity = identity.into();
        if identity.as_str().trim().is_empty() {
            return Err(SchedulerError::InvalidJob {
                identity: identity.0,
                reason: "identity must not be empty".to_string(),
            });
        }
        if lock_expiry < Duration::from_millis(1) {
            return Err(SchedulerError::InvalidJob {
                identity: identity.0,
                reason: "lock expiry must be at least 1ms".to_string(),
            });
        }
        Ok(Self {
            identity,
            lock_expiry,
            retention,
        })
    }
}

/// Result of one tick for one job on one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// Lock acquired and the job body completed.
    Ran,
    /// Another holder owns the lock.
    Contended,
    /// The lock store failed; the tick was skipped.
    StoreUnavailable,
    /// Shutdown began before the lock was obtained.
    Cancelled,
    /// Lock acquired but the job body returned an error.
    Failed,
}

impl TickOutcome {
    pub fn is_skip(self) -> bool {
        matches!(
            self,
            TickOutcome::Contended | TickOutcome::StoreUnavailable | TickOutcome::Cancelled
        )
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TickOutcome::Ran => "ran",
            TickOutcome::Contended => "contended",
            TickOutcome::StoreUnavailable => "store_unavailable",
            TickOutcome::Cancelled => "cancelled",
            TickOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Converts a job body's return value into the engine's error convention.
///
/// Implemented for `()` (infallible jobs) and `Result<(), E>`. Errors are
/// boxed as-is, so callers can still downcast to their own type.
pub trait IntoJobResult {
    fn into_job_result(self) -> std::result::Result<(), BoxError>;
}

impl IntoJobResult for () {
    fn into_job_result(self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

impl<E> IntoJobResult for std::result::Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_job_result(self) -> std::result::Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identity_is_rejected() {
        let err = JobParams::new("  ", Duration::from_secs(1), RetentionPolicy::Release)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_JOB");
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let err = JobParams::new("report", Duration::ZERO, RetentionPolicy::Release).unwrap_err();
        assert!(err.to_string().contains("lock expiry"));
        assert!(err.is_configuration());
    }

    #[test]
    fn keep_locked_flag_maps_to_policy() {
        assert_eq!(RetentionPolicy::from_keep_locked(true), RetentionPolicy::KeepLocked);
        assert!(!RetentionPolicy::from_keep_locked(false).keeps_lock());
        assert_eq!(RetentionPolicy::default(), RetentionPolicy::Release);
    }

    #[test]
    fn job_errors_keep_their_type() {
        #[derive(Debug)]
        struct Boom;
        impl fmt::Display for Boom {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "boom")
            }
        }
        impl std::error::Error for Boom {}

        let err = Err::<(), _>(Boom).into_job_result().unwrap_err();
        assert!(err.downcast_ref::<Boom>().is_some());
        assert!(().into_job_result().is_ok());
    }

    #[test]
    fn skips_are_not_runs() {
        assert!(TickOutcome::Contended.is_skip());
        assert!(!TickOutcome::Ran.is_skip());
        assert!(!TickOutcome::Failed.is_skip());
    }
}
