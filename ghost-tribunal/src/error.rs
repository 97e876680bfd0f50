// ghost-tribunal: Error types

use ghost_protocol::ErrorKind;
use thiserror::Error;

/// Result type alias for tribunal operations
pub type TribunalResult<T> = Result<T, TribunalError>;

/// Tribunal error types
#[derive(Debug, Clone, Error)]
pub enum TribunalError {
    #[error("no judges online")]
    NoJudgesOnline,

    #[error("no quorum: all {0} judges errored or timed out")]
    NoQuorum(usize),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("judge transport error: {0}")]
    Transport(String),
}

impl TribunalError {
    /// Wire kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TribunalError::NoJudgesOnline => ErrorKind::NoJudgesOnline,
            TribunalError::NoQuorum(_) => ErrorKind::NoQuorum,
            TribunalError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            TribunalError::Transport(_) => ErrorKind::BackendError,
        }
    }
}
