// ghost-glyph: Error types

use ghost_protocol::ErrorKind;
use thiserror::Error;

/// Result type alias for glyph operations
pub type GlyphResult<T> = Result<T, GlyphError>;

/// Glyph VM error types
#[derive(Debug, Clone, Error)]
pub enum GlyphError {
    #[error("stack underflow: {0}")]
    StackUnderflow(String),

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("loop limit of {0} iterations exceeded")]
    LoopLimit(usize),

    #[error("stack depth limit of {0} exceeded")]
    StackOverflow(usize),

    #[error("expression rejected: {0}")]
    ExpressionRejected(String),
}

impl GlyphError {
    /// Wire kind for this error. Depth-cap overflow surfaces as
    /// `loop-limit`, the closed set's resource-exhaustion kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GlyphError::StackUnderflow(_) => ErrorKind::StackUnderflow,
            GlyphError::UndefinedVariable(_) => ErrorKind::UndefinedVariable,
            GlyphError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            GlyphError::DivisionByZero => ErrorKind::DivisionByZero,
            GlyphError::LoopLimit(_) => ErrorKind::LoopLimit,
            GlyphError::StackOverflow(_) => ErrorKind::LoopLimit,
            GlyphError::ExpressionRejected(_) => ErrorKind::ExpressionRejected,
        }
    }
}
