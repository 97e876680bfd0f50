// ghost-protocol: Error kinds crossing the envelope boundary

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of error kinds that propagate across the envelope.
///
/// Every failure a handler, the registry, the scheduler, the tribunal, or
/// the proxy can surface maps to exactly one of these. Wire form is the
/// kebab-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    BadRequest,
    HandlerUnknown,
    TapeNotFound,
    TapeAlreadyRegistered,
    TapeBusy,
    TapePermissionDenied,
    ManifestMissing,
    ManifestParse,
    ManifestInvalidField,
    ManifestEscape,
    PathEscape,
    PathNotFound,
    StackUnderflow,
    UndefinedVariable,
    UnknownOperation,
    DivisionByZero,
    LoopLimit,
    ShardNotFound,
    EngineError,
    ScheduleExhausted,
    NoJudgesOnline,
    NoQuorum,
    DeadlineExceeded,
    HopLimitExceeded,
    ExpressionRejected,
    BackendError,
}

impl ErrorKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::HandlerUnknown => "handler-unknown",
            ErrorKind::TapeNotFound => "tape-not-found",
            ErrorKind::TapeAlreadyRegistered => "tape-already-registered",
            ErrorKind::TapeBusy => "tape-busy",
            ErrorKind::TapePermissionDenied => "tape-permission-denied",
            ErrorKind::ManifestMissing => "manifest-missing",
            ErrorKind::ManifestParse => "manifest-parse",
            ErrorKind::ManifestInvalidField => "manifest-invalid-field",
            ErrorKind::ManifestEscape => "manifest-escape",
            ErrorKind::PathEscape => "path-escape",
            ErrorKind::PathNotFound => "path-not-found",
            ErrorKind::StackUnderflow => "stack-underflow",
            ErrorKind::UndefinedVariable => "undefined-variable",
            ErrorKind::UnknownOperation => "unknown-operation",
            ErrorKind::DivisionByZero => "division-by-zero",
            ErrorKind::LoopLimit => "loop-limit",
            ErrorKind::ShardNotFound => "shard-not-found",
            ErrorKind::EngineError => "engine-error",
            ErrorKind::ScheduleExhausted => "schedule-exhausted",
            ErrorKind::NoJudgesOnline => "no-judges-online",
            ErrorKind::NoQuorum => "no-quorum",
            ErrorKind::DeadlineExceeded => "deadline-exceeded",
            ErrorKind::HopLimitExceeded => "hop-limit-exceeded",
            ErrorKind::ExpressionRejected => "expression-rejected",
            ErrorKind::BackendError => "backend-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_kebab_case() {
        assert_eq!(ErrorKind::TapeNotFound.as_str(), "tape-not-found");
        assert_eq!(ErrorKind::StackUnderflow.as_str(), "stack-underflow");
        assert_eq!(ErrorKind::HopLimitExceeded.as_str(), "hop-limit-exceeded");
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&ErrorKind::ManifestEscape).unwrap();
        assert_eq!(json, "\"manifest-escape\"");
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorKind::ManifestEscape);
    }
}
