// ghost-host: Error types

use ghost_glyph::GlyphError;
use ghost_kuhul::KuhulError;
use ghost_protocol::ErrorKind;
use ghost_registry::RegistryError;
use ghost_tribunal::TribunalError;
use thiserror::Error;

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Host error types. Subsystem errors are wrapped; `kind()` resolves
/// every variant to the closed wire set.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("program type not registered: {0}")]
    HandlerUnknown(String),

    #[error("path escapes sandbox root: {0}")]
    PathEscape(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("tape permission denied: {0}")]
    TapePermissionDenied(String),

    #[error("hop limit exceeded")]
    HopLimitExceeded,

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Glyph(#[from] GlyphError),

    #[error(transparent)]
    Kuhul(#[from] KuhulError),

    #[error(transparent)]
    Tribunal(#[from] TribunalError),
}

impl HostError {
    /// Wire kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::BadRequest(_) => ErrorKind::BadRequest,
            HostError::HandlerUnknown(_) => ErrorKind::HandlerUnknown,
            HostError::PathEscape(_) => ErrorKind::PathEscape,
            HostError::PathNotFound(_) => ErrorKind::PathNotFound,
            HostError::TapePermissionDenied(_) => ErrorKind::TapePermissionDenied,
            HostError::HopLimitExceeded => ErrorKind::HopLimitExceeded,
            HostError::Backend(_) => ErrorKind::BackendError,
            HostError::Registry(e) => e.kind(),
            HostError::Glyph(e) => e.kind(),
            HostError::Kuhul(e) => e.kind(),
            HostError::Tribunal(e) => e.kind(),
        }
    }
}
