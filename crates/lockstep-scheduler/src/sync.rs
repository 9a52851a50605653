use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use lockstep_core::config::{LockConfig, LockstepConfig, RedisOptions};
use lockstep_core::types::IntervalUnit;
use lockstep_lock::{DistributedLock, RedisLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::{JobCallable, TickEngine};
use crate::error::{Result, SchedulerError};
use crate::handle::{JobHandle, JobStats};
use crate::invoker::LockGuardedInvoker;
use crate::pipeline::ParameterPipeline;
use crate::types::{BoxError, IntoJobResult, JobParams, RetentionPolicy};

/// Scheduler whose jobs run on at most one instance per tick.
///
/// Every instance runs its own [`TickEngine`]; the only coordination is the
/// shared [`DistributedLock`]. Owns its lock-store connection and its engine;
/// nothing is process-global.
///
/// ```ignore
/// let mut scheduler = SyncScheduler::connect(&redis, &LockConfig::default()).await?;
/// scheduler
///     .every(1)
///     .seconds()
///     .keep_locked()
///     .register("heartbeat", Duration::from_secs(2), beat, (node_id,))?;
/// scheduler.start_async();
/// ```
pub struct SyncScheduler {
    lock: Arc<dyn DistributedLock>,
    engine: TickEngine,
    cancel: CancellationToken,
    jobs: Vec<JobHandle>,
}

impl SyncScheduler {
    /// Connect to Redis and build a scheduler on it.
    pub async fn connect(redis: &RedisOptions, lock: &LockConfig) -> Result<Self> {
        let lock = RedisLock::connect(redis, lock)
            .await
            .map_err(SchedulerError::Connection)?;
        Ok(Self::with_lock(Arc::new(lock)))
    }

    /// Connect using the `[redis]` and `[lock]` sections of a loaded config.
    pub async fn from_config(config: &LockstepConfig) -> Result<Self> {
        Self::connect(&config.redis, &config.lock).await
    }

    /// Build on a lock the caller already owns (shared connection, in-process store).
    pub fn with_lock(lock: Arc<dyn DistributedLock>) -> Self {
        let cancel = CancellationToken::new();
        Self {
            lock,
            engine: TickEngine::new(cancel.clone()),
            cancel,
            jobs: Vec::new(),
        }
    }

    /// Start describing a job that repeats every `count` units.
    pub fn every(&mut self, count: u32) -> JobBuilder<'_> {
        JobBuilder {
            scheduler: self,
            count,
            unit: None,
            retention: RetentionPolicy::Release,
        }
    }

    /// Hand control to the engine's background loops. Idempotent.
    pub fn start_async(&mut self) {
        info!(
            jobs = self.jobs.len(),
            backend = self.lock.backend(),
            "sync scheduler starting"
        );
        self.engine.start_async();
    }

    /// Give every registered job exactly one guarded tick, now, on this task.
    pub async fn run_once(&self) {
        self.engine.run_all_once().await;
    }

    /// Cancel pending lock acquisitions, stop the job loops and wait for them.
    ///
    /// A job body already running is allowed to finish.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.engine.shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn jobs(&self) -> &[JobHandle] {
        &self.jobs
    }

    pub fn job(&self, identity: &str) -> Option<&JobHandle> {
        self.jobs.iter().find(|j| j.identity().as_str() == identity)
    }

    pub fn lock_backend(&self) -> &'static str {
        self.lock.backend()
    }
}

/// Builder returned by [`SyncScheduler::every`].
#[must_use = "a job is only scheduled once `register` is called"]
pub struct JobBuilder<'a> {
    scheduler: &'a mut SyncScheduler,
    count: u32,
    unit: Option<IntervalUnit>,
    retention: RetentionPolicy,
}

impl JobBuilder<'_> {
    pub fn seconds(self) -> Self {
        self.unit(IntervalUnit::Seconds)
    }

    pub fn minutes(self) -> Self {
        self.unit(IntervalUnit::Minutes)
    }

    pub fn hours(self) -> Self {
        self.unit(IntervalUnit::Hours)
    }

    pub fn unit(mut self, unit: IntervalUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Never release after a successful run; let the lock expire instead.
    pub fn keep_locked(self) -> Self {
        self.retention(RetentionPolicy::KeepLocked)
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Register `job` under the lock `identity`, called with a copy of `args` on
    /// every tick this instance wins.
    ///
    /// Fails synchronously on a missing unit, a zero count, an invalid
    /// identity or expiry, or an identity already registered here.
    pub fn register<F, A, Fut>(
        self,
        identity: impl Into<String>,
        lock_expiry: Duration,
        job: F,
        args: A,
    ) -> Result<JobHandle>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoJobResult,
    {
        let interval = self.interval()?;
        let identity: String = identity.into();
        let params = JobParams::new(identity, lock_expiry, self.retention)?;
        let scheduler = self.scheduler;

        if scheduler.job(params.identity.as_str()).is_some() {
            return Err(SchedulerError::DuplicateJob {
                identity: params.identity.0,
            });
        }

        let stats = Arc::new(JobStats::default());
        let invoker = Arc::new(LockGuardedInvoker::new(
            Arc::clone(&scheduler.lock),
            scheduler.cancel.clone(),
            Arc::clone(&stats),
        ));
        let pipeline = Arc::new(ParameterPipeline::encode(params.clone(), job, args));

        let callable: JobCallable = Arc::new(
            move || -> BoxFuture<'static, std::result::Result<(), BoxError>> {
                let invoker = Arc::clone(&invoker);
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { invoker.on_tick(&pipeline).await.map(|_| ()) })
            },
        );
        scheduler
            .engine
            .register_repeating(params.identity.as_str(), interval, callable)?;

        info!(
            job = %params.identity,
            interval_secs = interval.as_secs(),
            lock_expiry_ms = params.lock_expiry.as_millis() as u64,
            retention = ?params.retention,
            "job registered"
        );
        let handle = JobHandle::new(params, interval, stats);
        scheduler.jobs.push(handle.clone());
        Ok(handle)
    }

    fn interval(&self) -> Result<Duration> {
        let unit = self.unit.ok_or_else(|| {
            SchedulerError::InvalidSchedule(
                "interval unit not set; call seconds(), minutes() or hours()".to_string(),
            )
        })?;
        if self.count == 0 {
            return Err(SchedulerError::InvalidSchedule(
                "interval count must be at least 1".to_string(),
            ));
        }
        unit.times(self.count).ok_or_else(|| {
            SchedulerError::InvalidSchedule(format!("every {} {unit} overflows", self.count))
        })
    }
}
