//! In-process lock store with the same semantics as the Redis backend.
//!
//! Every clone of a [`MemoryLock`] shares one map, so several schedulers in
//! one process contend exactly as separate processes would against Redis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::DistributedLock;
use crate::error::{LockError, Result};
use crate::types::{ttl_millis, LockHandle};

struct Held {
    token: String,
    expires_at: Instant,
}

#[derive(Clone, Default)]
pub struct MemoryLock {
    entries: Arc<DashMap<String, Held>>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently held by anyone (expired entries count as free).
    pub fn is_held(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|held| held.expires_at > Instant::now())
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<LockHandle> {
        ttl_millis(name, ttl)?;
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled {
                name: name.to_string(),
            });
        }

        let handle = LockHandle::new(name, ttl);
        let held = Held {
            token: handle.token().to_string(),
            expires_at: handle.expires_at(),
        };
        let now = Instant::now();

        match self.entries.entry(name.to_string()) {
            Entry::Occupied(current) if current.get().expires_at > now => {
                return Err(LockError::Unavailable {
                    name: name.to_string(),
                });
            }
            Entry::Occupied(mut expired) => {
                expired.insert(held);
            }
            Entry::Vacant(slot) => {
                slot.insert(held);
            }
        }

        debug!(lock = %handle, "memory lock acquired");
        Ok(handle)
    }

    async fn release(&self, handle: LockHandle, _cancel: &CancellationToken) -> Result<()> {
        let now = Instant::now();
        let removed = self.entries.remove_if(handle.name(), |_, held| {
            held.token == handle.token() && held.expires_at > now
        });
        if removed.is_none() {
            return Err(LockError::Release {
                name: handle.name().to_string(),
                reason: "lock expired or owned by another holder".to_string(),
            });
        }
        debug!(lock = %handle, "memory lock released");
        Ok(())
    }
}
