//! Error types for board mutations.

use crate::layers::LayerId;
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by document mutations.
///
/// Capacity and gesture errors are expected during normal use. The interaction
/// layer swallows them (nothing changes on the board) but keeps the last one
/// around so a UI can surface feedback.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Layer limit of {max} reached")]
    CapacityExceeded { max: usize },
    #[error("Invalid gesture: {0}")]
    InvalidGesture(&'static str),
    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),
    #[error("Document invariant violated: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BoardError {
    /// Whether this error is a user-level rejection rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BoardError::CapacityExceeded { .. } | BoardError::InvalidGesture(_)
        )
    }
}

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(BoardError::CapacityExceeded { max: 100 }.is_rejection());
        assert!(BoardError::InvalidGesture("too short").is_rejection());
        assert!(!BoardError::InvariantViolation("x".into()).is_rejection());
    }

    #[test]
    fn test_display() {
        let err = BoardError::CapacityExceeded { max: 100 };
        assert_eq!(err.to_string(), "Layer limit of 100 reached");
    }
}
