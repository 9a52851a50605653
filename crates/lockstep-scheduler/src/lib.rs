//! `lockstep-scheduler` — repeating jobs that run on one instance per tick.
//!
//! # Overview
//!
//! Each process runs its own [`engine::TickEngine`]. On every tick the
//! [`invoker::LockGuardedInvoker`] tries to take the job's distributed lock;
//! only the instance that gets it runs the job body. Everyone else skips the
//! tick quietly.
//!
//! # Retention
//!
//! | Policy        | After a successful run          | Effective period             |
//! |---------------|---------------------------------|------------------------------|
//! | `Release`     | lock released immediately       | `interval`                   |
//! | `KeepLocked`  | lock left to expire at its TTL  | `max(interval, lock_expiry)` |
//!
//! A retained lock blocks every instance, including the one that took it:
//! each tick acquires with a fresh token, so no instance can re-enter a
//! lock it still holds.
//!
//! A job body that fails is never released either; its lock expires on its own.

pub mod engine;
pub mod error;
pub mod handle;
pub mod invoker;
pub mod pipeline;
pub mod sync;
pub mod types;

pub use engine::{JobCallable, TickEngine};
pub use error::{Result, SchedulerError};
pub use handle::{JobHandle, JobSnapshot};
pub use invoker::LockGuardedInvoker;
pub use pipeline::ParameterPipeline;
pub use sync::{JobBuilder, SyncScheduler};
pub use types::{BoxError, IntoJobResult, JobIdentity, JobParams, RetentionPolicy, TickOutcome};

pub use lockstep_core::types::IntervalUnit;
