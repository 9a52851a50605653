//! `lockstep-lock` — named, TTL-bounded distributed locks.
//!
//! # Overview
//!
//! [`DistributedLock`] is the capability the scheduler consumes: acquire a
//! lock by name for a bounded time, and release it again with the
//! [`LockHandle`] returned by the acquisition. Two backends ship here:
//!
//! | Backend        | Shared across                          |
//! |----------------|----------------------------------------|
//! | [`RedisLock`]  | every process connected to one Redis   |
//! | [`MemoryLock`] | every clone of the handle, in-process  |
//!
//! Both treat an expired entry as free, and both refuse to release a lock
//! whose token no longer matches the stored owner.

pub mod backend;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod retry;
pub mod types;

pub use backend::DistributedLock;
pub use error::{LockError, Result};
pub use memory::MemoryLock;
pub use redis_store::RedisLock;
pub use retry::RetryBudget;
pub use types::LockHandle;
