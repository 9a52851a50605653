use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::LockHandle;

/// A named, TTL-bounded mutual-exclusion primitive shared through a backing store.
///
/// At most one [`LockHandle`] exists for a given name across every process
/// that shares the store, until that handle is released or its TTL elapses.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Backend label used in log fields.
    fn backend(&self) -> &'static str;

    /// Acquire `name` for at most `ttl`.
    ///
    /// Fails with `Unavailable` when another owner holds the lock, with
    /// `BackingStore` once the retry budget for store errors is spent, and
    /// with `Cancelled` as soon as `cancel` fires.
    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<LockHandle>;

    /// Release a lock previously returned by [`DistributedLock::acquire`].
    ///
    /// Fails with `Release` if the handle no longer owns the lock.
    async fn release(&self, handle: LockHandle, cancel: &CancellationToken) -> Result<()>;
}
