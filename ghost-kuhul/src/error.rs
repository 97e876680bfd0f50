// ghost-kuhul: Error types

use ghost_protocol::ErrorKind;
use thiserror::Error;

/// Result type alias for scheduler operations
pub type KuhulResult<T> = Result<T, KuhulError>;

/// Scheduler error types
#[derive(Debug, Clone, Error)]
pub enum KuhulError {
    #[error("shard not found: {0}")]
    ShardNotFound(String),

    #[error("engine error: {0}")]
    EngineError(String),

    #[error("schedule exhausted after {retries} retries")]
    ScheduleExhausted { retries: u32 },

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl KuhulError {
    /// Wire kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KuhulError::ShardNotFound(_) => ErrorKind::ShardNotFound,
            KuhulError::EngineError(_) => ErrorKind::EngineError,
            KuhulError::ScheduleExhausted { .. } => ErrorKind::ScheduleExhausted,
            KuhulError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
        }
    }
}
