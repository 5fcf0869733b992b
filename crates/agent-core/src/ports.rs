//! Collaborator ports.
//!
//! Planning, decomposition, evaluation and summarising are opaque decision points
//! (typically model-backed). The orchestrator only relies on these narrow contracts;
//! deterministic implementations live in [`crate::stubs`].

use action_primitives::{ActionResult, MicroAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepwise_core_types::{ErrorKind, Evidence, SurfaceSnapshot};
use stepwise_state_center::ExtractedData;

use crate::errors::AgentError;
use crate::model::{Goal, Plan, Step};
use crate::workflow::SummaryInput;

/// Surface snapshot paired with the data known at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    pub snapshot: SurfaceSnapshot,
    pub extracted_data: ExtractedData,
}

impl ObservedState {
    pub fn new(snapshot: SurfaceSnapshot, extracted_data: ExtractedData) -> Self {
        Self {
            snapshot,
            extracted_data,
        }
    }
}

/// Memory handed to the decomposer for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryHints {
    /// Keys already extracted; no need to extract them again.
    pub known_keys: Vec<String>,
    /// Failed-approach ledger of the step's slot.
    pub failed_approaches: Vec<String>,
}

/// Evaluator verdict before deterministic guards are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub success: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub partial_success: bool,
    /// Which listed acceptable alternative was achieved, if any.
    #[serde(default)]
    pub matched_alternative: Option<String>,
}

impl Evaluation {
    pub fn success(confidence: f64) -> Self {
        Self {
            success: true,
            confidence,
            ..Self::default()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// The expected outcome was missed but a listed alternative was reached.
    pub fn alternative(alternative: impl Into<String>, confidence: f64) -> Self {
        Self {
            success: true,
            confidence,
            partial_success: true,
            matched_alternative: Some(alternative.into()),
            ..Self::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Everything a planner needs to propose a continuation after a step failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanContext {
    pub goal: Goal,
    pub failed_step: Step,
    pub failure_reason: String,
    pub failure_kind: Option<ErrorKind>,
    pub completed_steps: Vec<Step>,
    pub accumulated_data: ExtractedData,
    /// Append-only within a run; each request for a slot sees a superset of the last.
    pub failed_approaches: Vec<String>,
    /// 1-based replan count for the failed step's slot.
    pub attempt_number: u32,
    pub snapshot: SurfaceSnapshot,
}

#[async_trait]
pub trait Planner: Send + Sync {
    /// Produce the initial plan for `goal`.
    async fn plan(&self, goal: &Goal, snapshot: &SurfaceSnapshot) -> Result<Plan, AgentError>;

    /// Produce a continuation replacing the remainder of the current plan.
    async fn replan(&self, context: &ReplanContext) -> Result<Plan, AgentError>;
}

#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(
        &self,
        step: &Step,
        snapshot: &SurfaceSnapshot,
        hints: &MemoryHints,
    ) -> Result<Vec<MicroAction>, AgentError>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        step: &Step,
        before: &ObservedState,
        after: &ObservedState,
        actions: &[MicroAction],
        results: &[ActionResult],
    ) -> Result<Evaluation, AgentError>;
}

/// Post-hoc reporting. A failure here only omits the summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, input: &SummaryInput) -> Result<String, AgentError>;
}
