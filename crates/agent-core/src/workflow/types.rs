//! Result types produced by a workflow run.

use std::collections::BTreeMap;
use std::fmt;

use action_primitives::{ActionResult, MicroAction};
use serde::{Deserialize, Serialize};
use stepwise_core_types::{ErrorKind, Evidence, StepId, WorkflowId};
use stepwise_state_center::ExtractedData;

use crate::model::{Goal, Step};
use crate::ports::ObservedState;

/// States of the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Planning,
    ExecutingStep,
    Evaluating,
    StepAdvance,
    Replanning,
    Degrading,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Partial,
    Failure,
}

/// Proof gathered for one step attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub before: ObservedState,
    pub after: ObservedState,
    pub extracted_data: ExtractedData,
    /// Artifacts supplied by the evaluator.
    pub evaluator: Vec<Evidence>,
}

/// Outcome of the final attempt of a step.
///
/// Attempts superseded by a replan are kept only as ledger text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub description: String,
    pub status: StepStatus,
    pub success: bool,
    pub actions: Vec<MicroAction>,
    pub action_results: Vec<ActionResult>,
    pub evidence: EvidenceBundle,
    pub error_reason: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub confidence: f64,
    pub degraded: bool,
    pub matched_alternative: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Success,
    Partial,
    Degraded,
    Failure,
}

impl WorkflowStatus {
    /// 100% -> success, >=70% -> partial, >=40% -> degraded, else failure.
    pub fn from_completion(done: usize, total: usize) -> Self {
        if total == 0 {
            return WorkflowStatus::Failure;
        }
        if done >= total {
            return WorkflowStatus::Success;
        }
        let ratio = done as f64 / total as f64;
        if ratio >= 0.7 {
            WorkflowStatus::Partial
        } else if ratio >= 0.4 {
            WorkflowStatus::Degraded
        } else {
            WorkflowStatus::Failure
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, WorkflowStatus::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Success => "success",
            WorkflowStatus::Partial => "partial",
            WorkflowStatus::Degraded => "degraded",
            WorkflowStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal report of one run. Created exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: WorkflowId,
    pub goal: Goal,
    pub status: WorkflowStatus,
    /// Slots finished with success or partial, in percent.
    pub completion_percentage: f64,
    pub extracted_data: ExtractedData,
    pub total_duration_ms: u64,
    /// Mean confidence over slots; unfinished slots count as zero.
    pub confidence_score: f64,
    pub degraded_step_ids: Vec<StepId>,
    /// Why the run did not fully succeed, when it did not.
    pub failure_reason: Option<String>,
    /// Blocked steps and the dependencies they were waiting on.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unmet_dependencies: BTreeMap<StepId, Vec<StepId>>,
    pub steps: Vec<StepResult>,
    /// Failed-approach ledgers keyed by the step that opened each slot.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_approaches: BTreeMap<StepId, Vec<String>>,
    pub replans_used: u32,
    pub checkpoints: Vec<String>,
    pub final_phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, WorkflowStatus::Success)
    }

    pub fn step(&self, id: &StepId) -> Option<&StepResult> {
        self.steps.iter().find(|step| &step.step_id == id)
    }
}

/// Material handed to the summarizer after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub goal: Goal,
    pub status: WorkflowStatus,
    /// Every step that was dispatched, in order.
    pub plan: Vec<Step>,
    pub steps: Vec<StepResult>,
    pub extracted_data: ExtractedData,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_thresholds() {
        assert_eq!(WorkflowStatus::from_completion(4, 4), WorkflowStatus::Success);
        assert_eq!(WorkflowStatus::from_completion(7, 10), WorkflowStatus::Partial);
        assert_eq!(WorkflowStatus::from_completion(2, 3), WorkflowStatus::Degraded);
        assert_eq!(WorkflowStatus::from_completion(2, 5), WorkflowStatus::Degraded);
        assert_eq!(WorkflowStatus::from_completion(1, 3), WorkflowStatus::Failure);
        assert_eq!(WorkflowStatus::from_completion(0, 0), WorkflowStatus::Failure);
    }
}
