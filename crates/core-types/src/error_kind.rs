//! Error taxonomy shared by the executor and the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure classes recognised by the retry and replan policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Timeout,
    ElementNotFound,
    NavigationError,
    ValidationError,
    Unknown,
}

impl ErrorKind {
    /// Whether the default retry policy may try the same step again.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::ElementNotFound | ErrorKind::NavigationError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ElementNotFound => "element-not-found",
            ErrorKind::NavigationError => "navigation-error",
            ErrorKind::ValidationError => "validation-error",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Human-readable hint describing what a caller could try next.
    pub fn suggested_action(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "wait for the page to settle and retry with a longer timeout",
            ErrorKind::ElementNotFound => {
                "refresh the element index and target a different element"
            }
            ErrorKind::NavigationError => "reload the page or navigate to the target URL again",
            ErrorKind::ValidationError => "revise the step inputs; retrying unchanged will fail",
            ErrorKind::Unknown => "inspect the execution log before retrying",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error message together with its class and recovery hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
    pub suggested_action: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: kind.is_recoverable(),
            suggested_action: kind.suggested_action().to_string(),
        }
    }

    /// Classify a free-form error message by keyword.
    ///
    /// Used for errors that cross a port boundary as plain text (planner or evaluator
    /// failures, driver messages) where no typed kind is available.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let kind = if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if lower.contains("not found")
            || lower.contains("no such element")
            || lower.contains("element index")
        {
            ErrorKind::ElementNotFound
        } else if lower.contains("navigat") || lower.contains("net::") || lower.contains("404") {
            ErrorKind::NavigationError
        } else if lower.contains("invalid") || lower.contains("validation") {
            ErrorKind::ValidationError
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, message)
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_kinds_are_recoverable() {
        assert!(ErrorKind::Timeout.is_recoverable());
        assert!(ErrorKind::ElementNotFound.is_recoverable());
        assert!(ErrorKind::NavigationError.is_recoverable());
        assert!(!ErrorKind::ValidationError.is_recoverable());
        assert!(!ErrorKind::Unknown.is_recoverable());
    }

    #[test]
    fn classify_uses_keywords() {
        assert_eq!(
            ClassifiedError::classify("wait timed out after 5000ms").kind,
            ErrorKind::Timeout
        );
        assert_eq!(
            ClassifiedError::classify("Element index 7 not found").kind,
            ErrorKind::ElementNotFound
        );
        assert_eq!(
            ClassifiedError::classify("navigation to https://x failed").kind,
            ErrorKind::NavigationError
        );
        let other = ClassifiedError::classify("something odd");
        assert_eq!(other.kind, ErrorKind::Unknown);
        assert!(!other.recoverable);
    }

    #[test]
    fn kinds_serialize_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::ElementNotFound).unwrap();
        assert_eq!(json, "\"element-not-found\"");
    }
}
