use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{JobIdentity, JobParams, RetentionPolicy, TickOutcome};

/// Per-job counters, written by the invoker and read through [`JobHandle`].
#[derive(Debug, Default)]
pub struct JobStats {
    runs: AtomicU64,
    contended: AtomicU64,
    store_errors: AtomicU64,
    cancelled: AtomicU64,
    job_errors: AtomicU64,
    release_failures: AtomicU64,
    last_run: Mutex<Option<DateTime<Utc>>>,
    last_outcome: Mutex<Option<TickOutcome>>,
}

impl JobStats {
    pub fn record(&self, outcome: TickOutcome) {
        let counter = match outcome {
            TickOutcome::Ran => &self.runs,
            TickOutcome::Contended => &self.contended,
            TickOutcome::StoreUnavailable => &self.store_errors,
            TickOutcome::Cancelled => &self.cancelled,
            TickOutcome::Failed => &self.job_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        // a failed body still ran under the lock
        if !outcome.is_skip() {
            *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        }
        *self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
    }

    pub fn record_release_failure(&self) {
        self.release_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reference to a registered job.
///
/// Cheap to clone; every clone observes the same live counters.
#[derive(Debug, Clone)]
pub struct JobHandle {
    params: JobParams,
    interval: Duration,
    stats: Arc<JobStats>,
}

impl JobHandle {
    pub(crate) fn new(params: JobParams, interval: Duration, stats: Arc<JobStats>) -> Self {
        Self {
            params,
            interval,
            stats,
        }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.params.identity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn lock_expiry(&self) -> Duration {
        self.params.lock_expiry
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.params.retention
    }

    /// Ticks on this instance that acquired the lock and completed the body.
    pub fn run_count(&self) -> u64 {
        self.stats.runs.load(Ordering::Relaxed)
    }

    /// Ticks skipped for any reason (contention, store error, shutdown).
    pub fn skip_count(&self) -> u64 {
        self.stats.contended.load(Ordering::Relaxed)
            + self.stats.store_errors.load(Ordering::Relaxed)
            + self.stats.cancelled.load(Ordering::Relaxed)
    }

    pub fn store_error_count(&self) -> u64 {
        self.stats.store_errors.load(Ordering::Relaxed)
    }

    pub fn job_error_count(&self) -> u64 {
        self.stats.job_errors.load(Ordering::Relaxed)
    }

    pub fn release_failure_count(&self) -> u64 {
        self.stats.release_failures.load(Ordering::Relaxed)
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.stats.last_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_outcome(&self) -> Option<TickOutcome> {
        *self.stats.last_outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            identity: self.params.identity.clone(),
            interval_secs: self.interval.as_secs(),
            lock_expiry_ms: u64::try_from(self.params.lock_expiry.as_millis()).unwrap_or(u64::MAX),
            retention: self.params.retention,
            run_count: self.run_count(),
            skip_count: self.skip_count(),
            store_error_count: self.store_error_count(),
            job_error_count: self.job_error_count(),
            release_failure_count: self.release_failure_count(),
            last_run: self.last_run(),
            last_outcome: self.last_outcome(),
        }
    }
}

/// Serializable point-in-time view of a [`JobHandle`].
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub identity: JobIdentity,
    pub interval_secs: u64,
    pub lock_expiry_ms: u64,
    pub retention: RetentionPolicy,
    pub run_count: u64,
    pub skip_count: u64,
    pub store_error_count: u64,
    pub job_error_count: u64,
    pub release_failure_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
}
