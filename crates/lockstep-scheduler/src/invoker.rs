use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use lockstep_lock::{DistributedLock, LockError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::panic_message;
use crate::handle::JobStats;
use crate::pipeline::ParameterPipeline;
use crate::types::{BoxError, IntoJobResult, TickOutcome};

/// Turns one tick into one lock-guarded execution attempt.
///
/// The job body is only ever called while this instance holds the lock for
/// the job's identity. Failing to get the lock is a normal outcome, not an
/// error: the tick is skipped and `Ok` is returned.
pub struct LockGuardedInvoker {
    lock: Arc<dyn DistributedLock>,
    /// Fires on scheduler shutdown; aborts pending acquisitions.
    cancel: CancellationToken,
    stats: Arc<JobStats>,
}

impl LockGuardedInvoker {
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        cancel: CancellationToken,
        stats: Arc<JobStats>,
    ) -> Self {
        Self {
            lock,
            cancel,
            stats,
        }
    }

    /// Acquire, run, then release or retain.
    ///
    /// A job-body error is returned unchanged and the lock is left to expire
    /// at its TTL rather than released.
    pub async fn on_tick<F, A, Fut>(
        &self,
        pipeline: &ParameterPipeline<F, A>,
    ) -> Result<TickOutcome, BoxError>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future,
        Fut::Output: IntoJobResult,
    {
        let (params, args) = pipeline.decode();
        let identity = params.identity.as_str();

        let handle = match self
            .lock
            .acquire(identity, params.lock_expiry, &self.cancel)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let outcome = skip_outcome(&e);
                match outcome {
                    TickOutcome::StoreUnavailable => warn!(
                        job = %identity,
                        backend = self.lock.backend(),
                        error = %e,
                        "lock store unavailable, skipping tick"
                    ),
                    _ => debug!(job = %identity, reason = %outcome, "not our turn, skipping tick"),
                }
                self.stats.record(outcome);
                return Ok(outcome);
            }
        };

        debug!(job = %identity, lock = %handle, "lock held, running job");
        let result = match AssertUnwindSafe(async { pipeline.call(args).await })
            .catch_unwind()
            .await
        {
            Ok(output) => output.into_job_result(),
            Err(panic) => Err(format!("job panicked: {}", panic_message(panic.as_ref())).into()),
        };
        if let Err(e) = result {
            self.stats.record(TickOutcome::Failed);
            debug!(job = %identity, "job failed, lock left to expire");
            return Err(e);
        }
        self.stats.record(TickOutcome::Ran);

        if handle.is_expired() {
            warn!(
                job = %identity,
                ttl_ms = handle.ttl().as_millis() as u64,
                "job outlived its lock; another instance may have run concurrently"
            );
        }

        if params.retention.keeps_lock() {
            debug!(
                job = %identity,
                ttl_ms = handle.ttl().as_millis() as u64,
                "lock retained until expiry"
            );
        } else {
            // a finished job hands the lock back even while shutting down
            let release_cancel = CancellationToken::new();
            if let Err(e) = self.lock.release(handle, &release_cancel).await {
                self.stats.record_release_failure();
                warn!(job = %identity, error = %e, "lock release failed, relying on expiry");
            }
        }
        Ok(TickOutcome::Ran)
    }
}

fn skip_outcome(e: &LockError) -> TickOutcome {
    if e.is_contention() {
        TickOutcome::Contended
    } else if matches!(e, LockError::Cancelled { .. }) {
        TickOutcome::Cancelled
    } else {
        TickOutcome::StoreUnavailable
    }
}
