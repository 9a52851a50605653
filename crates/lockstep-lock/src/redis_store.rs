//! Redis-backed distributed lock.
//!
//! Acquisition is a single `SET key token NX PX ttl`; release is a Lua
//! compare-and-delete so a holder whose TTL already lapsed can never delete
//! the lock of whoever took it over.

use std::time::Duration;

use async_trait::async_trait;
use lockstep_core::config::{LockConfig, RedisOptions};
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::DistributedLock;
use crate::error::{LockError, Result};
use crate::retry::{with_retries, RetryBudget};
use crate::types::{ttl_millis, LockHandle};

const KEY_PREFIX: &str = "lockstep:lock:";

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisLock {
    conn: ConnectionManager,
    budget: RetryBudget,
    release_script: Script,
}

impl RedisLock {
    /// Connect to Redis and verify the connection with `PING`.
    pub async fn connect(redis_opts: &RedisOptions, lock: &LockConfig) -> Result<Self> {
        info!(addr = %redis_opts.addr, db = redis_opts.db, "connecting to redis lock store");

        let client = Client::open(connection_url(redis_opts).as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(LockError::BackingStore(format!(
                "unexpected PING reply: {pong}"
            )));
        }

        info!("redis lock store connected");
        Ok(Self::with_connection(conn, lock))
    }

    /// Build on a connection the caller already owns (shared with other users).
    pub fn with_connection(conn: ConnectionManager, lock: &LockConfig) -> Self {
        Self {
            conn,
            budget: RetryBudget::from_config(lock),
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Returns `true` when the key was set, `false` when it already exists.
    async fn try_set(&self, key: &str, token: &str, ttl_ms: u64) -> RedisResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> RedisResult<i64> {
        let mut conn = self.conn.clone();
        self.release_script
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<LockHandle> {
        let ttl_ms = ttl_millis(name, ttl)?;
        let key = lock_key(name);
        let handle = LockHandle::new(name, ttl);
        let acquired = with_retries(name, self.budget, cancel, || {
            self.try_set(&key, handle.token(), ttl_ms)
        })
        .await?;

        if !acquired {
            return Err(LockError::Unavailable {
                name: name.to_string(),
            });
        }
        debug!(lock = %handle, ttl_ms, "redis lock acquired");
        Ok(handle)
    }

    async fn release(&self, handle: LockHandle, cancel: &CancellationToken) -> Result<()> {
        let key = lock_key(handle.name());
        let deleted = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(LockError::Release {
                    name: handle.name().to_string(),
                    reason: "cancelled".to_string(),
                });
            }
            r = self.compare_and_delete(&key, handle.token()) => r?,
        };

        if deleted == 0 {
            return Err(LockError::Release {
                name: handle.name().to_string(),
                reason: "lock expired or owned by another holder".to_string(),
            });
        }
        debug!(lock = %handle, "redis lock released");
        Ok(())
    }
}

/// Namespaced Redis key for a lock name.
pub fn lock_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// `redis://[:password@]addr/db`, with the password percent-encoded.
pub fn connection_url(opts: &RedisOptions) -> String {
    match opts.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => format!(
            "redis://:{}@{}/{}",
            urlencoding::encode(password),
            opts.addr,
            opts.db
        ),
        None => format!("redis://{}/{}", opts.addr, opts.db),
    }
}
