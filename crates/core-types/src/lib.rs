//! Shared value types for the Stepwise crates.
//!
//! Identifiers, evidence artifacts, surface snapshots and the error taxonomy live
//! here so every layer (executor, scheduler, accumulator, orchestrator) speaks the
//! same vocabulary without depending on each other.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod error_kind;
pub mod evidence;
pub mod snapshot;

pub use error_kind::{ClassifiedError, ErrorKind};
pub use evidence::{Evidence, EvidenceKind};
pub use snapshot::{Bounds, ElementInfo, Point, SurfaceSnapshot};

/// Shared error type for value-type invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("evidence payload must not be empty")]
    EmptyEvidence,
    #[error("confidence {0} is outside [0, 100]")]
    ConfidenceOutOfRange(f64),
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifier of one workflow run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a strategic step. Planners choose these, so they are plain strings.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier attached to a single micro-action execution for log correlation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_id_serializes_transparently() {
        let id = StepId::from("open-search");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"open-search\"");
        assert_eq!(id.to_string(), "open-search");
    }

    #[test]
    fn workflow_ids_are_unique() {
        assert_ne!(WorkflowId::new(), WorkflowId::new());
    }
}
