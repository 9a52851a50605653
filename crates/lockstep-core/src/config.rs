use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{LockstepError, Result};
use crate::types::IntervalUnit;

pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_ACQUIRE_TRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// Top-level config (lockstep.toml + LOCKSTEP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockstepConfig {
    #[serde(default)]
    pub redis: RedisOptions,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Connection settings for the Redis instance backing the lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisOptions {
    /// `host:port` of the Redis server.
    #[serde(default = "default_redis_addr")]
    pub addr: String,
    pub password: Option<String>,
    /// Logical database index (`SELECT n`).
    #[serde(default)]
    pub db: i64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
            password: None,
            db: 0,
        }
    }
}

/// Lock acquisition retry budget.
///
/// Retries apply to backing-store failures only. A lock that is held by
/// another instance is reported on the first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_tries")]
    pub tries: u32,
    /// Base backoff; attempt `n` waits `n * retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl LockConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            tries: DEFAULT_ACQUIRE_TRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// A shell-command job run by `lockstep-runner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Lock identity, shared by every instance running this job.
    pub name: String,
    pub every: u32,
    pub unit: IntervalUnit,
    pub lock_expiry_secs: u64,
    #[serde(default)]
    pub keep_locked: bool,
    pub command: String,
}

impl JobConfig {
    pub fn lock_expiry(&self) -> Duration {
        Duration::from_secs(self.lock_expiry_secs)
    }

    /// Reject definitions that could never be scheduled.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| LockstepError::InvalidJob {
            job: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.every == 0 {
            return Err(invalid("every must be at least 1"));
        }
        if self.lock_expiry_secs == 0 {
            return Err(invalid("lock_expiry_secs must be at least 1"));
        }
        if self.command.trim().is_empty() {
            return Err(invalid("command must not be empty"));
        }
        Ok(())
    }
}

fn default_redis_addr() -> String {
    DEFAULT_REDIS_ADDR.to_string()
}
fn default_tries() -> u32 {
    DEFAULT_ACQUIRE_TRIES
}
fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl LockstepConfig {
    /// Load config from a TOML file with LOCKSTEP_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.lockstep/lockstep.toml
    ///
    /// Nested keys use a double underscore: `LOCKSTEP_REDIS__ADDR=redis:6379`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("LOCKSTEP_").split("__")),
        )
    }

    /// Extract and validate from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: LockstepConfig = figment
            .extract()
            .map_err(|e| LockstepError::Config(e.to_string()))?;

        for job in &config.jobs {
            job.validate()?;
        }
        if config.lock.tries == 0 {
            return Err(LockstepError::Config(
                "lock.tries must be at least 1".to_string(),
            ));
        }
        tracing::debug!(jobs = config.jobs.len(), "config loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lockstep/lockstep.toml", home)
}
