//! `lockstep-core` — configuration and shared types for the lockstep workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::{JobConfig, LockConfig, LockstepConfig, RedisOptions};
pub use error::{LockstepError, Result};
pub use types::IntervalUnit;
