//! Workflow orchestration.
//!
//! The control loop is an explicit state machine:
//!
//! ```text
//! Idle -> Planning -> ExecutingStep -> Evaluating -> StepAdvance  -> ExecutingStep ...
//!                                                 -> Replanning   -> ExecutingStep ...
//!                                                 -> Degrading    -> ExecutingStep ...
//!                                                 -> Aborted
//!                     ExecutingStep (queue drained) -> Completed
//! ```
//!
//! Every failure either consumes replan budget or ends the step (degradation) or the
//! run (abort), so the loop always terminates with exactly one [`WorkflowResult`].
//!
//! # Key Components
//!
//! - [`WorkflowConfig`]: budgets and timing
//! - [`WorkflowOrchestrator`]: owns the queue, accumulator and ledgers for one run
//! - [`WorkflowResult`] / [`StepResult`]: the terminal report

pub mod config;
pub mod controller;
pub mod types;

pub use config::WorkflowConfig;
pub use controller::{Collaborators, WorkflowOrchestrator};
pub use types::{
    EvidenceBundle, Phase, StepResult, StepStatus, SummaryInput, WorkflowResult, WorkflowStatus,
};
