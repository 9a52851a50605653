use thiserror::Error;

/// Errors returned by [`crate::DistributedLock`] implementations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another owner currently holds the lock. Expected under contention.
    #[error("Lock {name} is held by another owner")]
    Unavailable { name: String },

    /// The backing store could not be reached or returned an error.
    #[error("Lock store error: {0}")]
    BackingStore(String),

    /// The handle no longer owns the lock (expired or taken over).
    #[error("Failed to release lock {name}: {reason}")]
    Release { name: String, reason: String },

    /// The caller's cancellation token fired before the lock was obtained.
    #[error("Lock acquisition for {name} cancelled")]
    Cancelled { name: String },

    /// TTL below the store's one-millisecond resolution.
    #[error("Invalid TTL for lock {name}: {ttl_ms}ms")]
    InvalidTtl { name: String, ttl_ms: u128 },
}

impl LockError {
    /// Short error code string for logs.
    pub fn code(&self) -> &'static str {
        match self {
            LockError::Unavailable { .. } => "LOCK_UNAVAILABLE",
            LockError::BackingStore(_) => "BACKING_STORE_ERROR",
            LockError::Release { .. } => "RELEASE_ERROR",
            LockError::Cancelled { .. } => "CANCELLED",
            LockError::InvalidTtl { .. } => "INVALID_TTL",
        }
    }

    /// True when the failure is ordinary contention rather than a fault.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::Unavailable { .. })
    }
}

impl From<redis::RedisError> for LockError {
    fn from(e: redis::RedisError) -> Self {
        LockError::BackingStore(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
