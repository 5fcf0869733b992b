//! Agent core for Stepwise.
//!
//! Plans and steps, the collaborator ports (planner, decomposer, evaluator,
//! summarizer), deterministic verdict guards and the bounded workflow
//! orchestrator that ties them to the micro-action executor.

pub mod errors;
pub mod judge;
pub mod model;
pub mod plan_validator;
pub mod ports;
pub mod stubs;
pub mod workflow;

pub use errors::AgentError;
pub use judge::{judge, Verdict};
pub use model::{Goal, Plan, Step, StepIntent};
pub use plan_validator::{PlanValidationIssue, PlanValidator, ValidatedPlan, DEFAULT_MAX_PLAN_STEPS};
pub use ports::{
    Decomposer, Evaluation, Evaluator, MemoryHints, ObservedState, Planner, ReplanContext,
    Summarizer,
};
pub use workflow::{
    Collaborators, EvidenceBundle, Phase, StepResult, StepStatus, SummaryInput, WorkflowConfig,
    WorkflowOrchestrator, WorkflowResult, WorkflowStatus,
};
