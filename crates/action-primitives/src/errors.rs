//! Error types for micro-action execution

use stepwise_core_types::{ClassifiedError, ErrorKind};
use thiserror::Error;

use crate::surface::DriverError;

/// Failures raised while executing a single micro-action.
///
/// These never cross the executor boundary as `Err`; they are folded into a failed
/// [`ActionResult`](crate::types::ActionResult).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Element-targeted action without an element index
    #[error("{0} requires an element index")]
    MissingElementIndex(&'static str),

    /// Element index absent from the snapshot, or element without geometry
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Wait or action exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Navigation failed or landed on an error page
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Action payload is malformed (empty key, unknown option, ...)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Step budget exhausted before the action could start
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Driver-level failure with no better classification
    #[error("Driver error: {0}")]
    Driver(String),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::MissingElementIndex(_) | ActionError::ElementNotFound(_) => {
                ErrorKind::ElementNotFound
            }
            ActionError::Timeout(_) | ActionError::Interrupted(_) => ErrorKind::Timeout,
            ActionError::Navigation(_) => ErrorKind::NavigationError,
            ActionError::InvalidAction(_) => ErrorKind::ValidationError,
            ActionError::Driver(_) => ErrorKind::Unknown,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_recoverable()
    }

    pub fn classify(&self) -> ClassifiedError {
        ClassifiedError::new(self.kind(), self.to_string())
    }
}

impl From<DriverError> for ActionError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::TargetNotFound(detail) => ActionError::ElementNotFound(detail),
            DriverError::OptionNotFound(detail) => ActionError::InvalidAction(detail),
            DriverError::Navigation(detail) => ActionError::Navigation(detail),
            DriverError::Timeout(detail) => ActionError::Timeout(detail),
            DriverError::Io(detail) => ActionError::Driver(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_map_onto_taxonomy() {
        let err: ActionError = DriverError::TargetNotFound("#buy".into()).into();
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);
        assert!(err.is_retryable());

        let err: ActionError = DriverError::OptionNotFound("XL".into()).into();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(!err.is_retryable());
    }

    #[test]
    fn classified_error_carries_message() {
        let classified = ActionError::MissingElementIndex("click").classify();
        assert_eq!(classified.kind, ErrorKind::ElementNotFound);
        assert!(classified.recoverable);
        assert_eq!(classified.message, "click requires an element index");
    }
}
