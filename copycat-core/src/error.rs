//! # Error Types for Copycat
//!
//! Unified error handling across the Copycat crates.
//!
//! Only two kinds of failure reach a caller of the engine: bad input, which is
//! rejected before any trial runs, and internal invariant violations, which
//! indicate a logic bug. Running out of steps is a normal way for a trial to
//! end and never shows up here.

use thiserror::Error;

/// Main error type for Copycat operations
#[derive(Error, Debug)]
pub enum CopycatError {
    /// Empty strings, non-letter characters, zero trials, mismatched lengths
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A structure request referenced something the workspace never owned,
    /// or the concept graph is malformed
    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for Copycat operations
pub type CopycatResult<T> = Result<T, CopycatError>;

impl CopycatError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InternalInvariantViolation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that indicate a bug rather than a bad request
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation(_))
    }
}

impl From<serde_json::Error> for CopycatError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CopycatError::invalid_input("empty target");
        assert_eq!(err.to_string(), "Invalid input: empty target");
        assert!(!err.is_defect());

        let err = CopycatError::invariant("bond 7 not owned");
        assert!(err.is_defect());
    }
}
