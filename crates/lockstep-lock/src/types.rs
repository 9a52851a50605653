use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{LockError, Result};

/// Proof of ownership for one held lock.
///
/// Not `Clone`: a handle belongs to the single invocation that acquired it
/// and is consumed by [`crate::DistributedLock::release`].
#[derive(Debug)]
pub struct LockHandle {
    name: String,
    /// Random per-acquisition value stored as the lock owner.
    token: String,
    ttl: Duration,
    acquired_at: Instant,
}

impl LockHandle {
    /// New handle with a fresh UUID v4 token, timestamped now.
    ///
    /// Backends create the handle before writing to the store, so
    /// [`LockHandle::expires_at`] never lies later than the store's own expiry.
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            token: Uuid::new_v4().to_string(),
            ttl,
            acquired_at: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.ttl
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }
}

impl fmt::Display for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, &self.token[..8])
    }
}

/// TTL in whole milliseconds; zero is rejected.
pub(crate) fn ttl_millis(name: &str, ttl: Duration) -> Result<u64> {
    let ms = ttl.as_millis();
    if ms == 0 {
        return Err(LockError::InvalidTtl {
            name: name.to_string(),
            ttl_ms: ms,
        });
    }
    Ok(u64::try_from(ms).unwrap_or(u64::MAX))
}
