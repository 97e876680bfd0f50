// ghost-registry: Error types

use ghost_protocol::ErrorKind;
use thiserror::Error;

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry and manifest error types
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tape not found: {0}")]
    TapeNotFound(String),

    #[error("tape already registered: {0}")]
    AlreadyRegistered(String),

    #[error("tape busy: {id} has {inflight} requests in flight")]
    TapeBusy { id: String, inflight: u64 },

    #[error("manifest missing at {0}")]
    ManifestMissing(String),

    #[error("manifest parse failure: {0}")]
    ManifestParse(String),

    #[error("manifest field '{field}' invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("manifest entry escapes tape root: {0}")]
    EntryEscape(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Wire kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::TapeNotFound(_) => ErrorKind::TapeNotFound,
            RegistryError::AlreadyRegistered(_) => ErrorKind::TapeAlreadyRegistered,
            RegistryError::TapeBusy { .. } => ErrorKind::TapeBusy,
            RegistryError::ManifestMissing(_) => ErrorKind::ManifestMissing,
            RegistryError::ManifestParse(_) => ErrorKind::ManifestParse,
            RegistryError::InvalidField { .. } => ErrorKind::ManifestInvalidField,
            RegistryError::EntryEscape(_) => ErrorKind::ManifestEscape,
            RegistryError::Io(_) => ErrorKind::PathNotFound,
        }
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        RegistryError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
