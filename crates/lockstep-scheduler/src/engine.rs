use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::types::BoxError;

/// What the engine fires on every tick. Knows nothing about locking.
pub type JobCallable =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

struct RegisteredJob {
    name: String,
    interval: Duration,
    callable: JobCallable,
}

/// Local trigger engine: one Tokio task per job, ticking at a fixed interval.
///
/// The first tick fires immediately on start. Ticks for one job are strictly
/// sequential: the callable is awaited inline, so a slow job delays that
/// job's next tick and never overlaps itself.
pub struct TickEngine {
    jobs: Vec<RegisteredJob>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    running: bool,
    stopped: bool,
}

impl TickEngine {
    /// `cancel` stops every job loop when it fires.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            jobs: Vec::new(),
            cancel,
            tracker: TaskTracker::new(),
            running: false,
            stopped: false,
        }
    }

    /// Fire `callable` every `interval`, starting as soon as the engine runs.
    ///
    /// Jobs registered after [`TickEngine::start_async`] start immediately.
    pub fn register_repeating(
        &mut self,
        name: &str,
        interval: Duration,
        callable: JobCallable,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidSchedule(format!(
                "interval for {name} must be greater than zero"
            )));
        }
        let job = RegisteredJob {
            name: name.to_string(),
            interval,
            callable,
        };
        if self.running {
            self.spawn(&job);
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Spawn every job loop. Idempotent; a stopped engine stays stopped.
    pub fn start_async(&mut self) {
        if self.stopped {
            warn!("tick engine already shut down; start ignored");
            return;
        }
        if self.running {
            return;
        }
        self.running = true;
        info!(jobs = self.jobs.len(), "tick engine started");
        for job in &self.jobs {
            self.spawn(job);
        }
    }

    /// Fire every registered job once, in registration order, on the caller's task.
    pub async fn run_all_once(&self) {
        for job in &self.jobs {
            dispatch(&job.name, &job.callable).await;
        }
    }

    /// Stop all job loops and wait for in-flight ticks to finish.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        if self.running {
            info!("tick engine shut down");
        }
        self.running = false;
        self.stopped = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn spawn(&self, job: &RegisteredJob) {
        let name = job.name.clone();
        let period = job.interval;
        let callable = Arc::clone(&job.callable);
        let cancel = self.cancel.clone();
        self.tracker.spawn(run_job(name, period, callable, cancel));
    }
}

async fn run_job(name: String, period: Duration, callable: JobCallable, cancel: CancellationToken) {
    debug!(job = %name, period_ms = period.as_millis() as u64, "job loop started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => dispatch(&name, &callable).await,
            _ = cancel.cancelled() => break,
        }
    }
    debug!(job = %name, "job loop stopped");
}

/// Errors from the callable are the job's own; log them and keep ticking.
/// A panic is caught here so it cannot take the job's loop down with it.
async fn dispatch(name: &str, callable: &JobCallable) {
    match AssertUnwindSafe(async { callable().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(job = %name, error = %e, "job tick failed"),
        Err(panic) => error!(
            job = %name,
            panic = %panic_message(panic.as_ref()),
            "job tick panicked"
        ),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
