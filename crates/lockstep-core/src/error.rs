use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockstepError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job definition ({job}): {reason}")]
    InvalidJob { job: String, reason: String },
}

impl LockstepError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            LockstepError::Config(_) => "CONFIG_ERROR",
            LockstepError::InvalidJob { .. } => "INVALID_JOB",
        }
    }
}

pub type Result<T> = std::result::Result<T, LockstepError>;
