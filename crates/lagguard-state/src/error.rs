//! Error types for the lagguard state.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("invalid threshold {0}: must be a finite value >= 0")]
    InvalidThreshold(f64),

    #[error("invalid metric value {0}: must be finite")]
    InvalidValue(f64),
}
