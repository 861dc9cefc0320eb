//! Error types.

use thiserror::Error;

/// Result of a call through a breaker.
///
/// `Open` and `TooManyRequests` are produced by the breaker and mean the
/// action never ran. `Operation` carries the action's own error as-is.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("too many requests: circuit breaker is half-open")]
    TooManyRequests,

    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True when the breaker refused the call without running the action.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BreakerError::Open | BreakerError::TooManyRequests)
    }

    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

/// Breaker construction failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("circuit breaker requires an action")]
    MissingAction,
}
