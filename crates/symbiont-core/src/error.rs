//! Error types for symbiont-core.

use thiserror::Error;

/// Errors raised by the pure Symbiont components.
///
/// Matching and reputation never fail on well-formed input; the only
/// failures are malformed values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A required field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid amount (overflow, underflow, negative, or malformed).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl CoreError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
