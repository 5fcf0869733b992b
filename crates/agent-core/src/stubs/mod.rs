//! Deterministic collaborators.
//!
//! These stand in for model-backed planners and evaluators in tests, offline
//! scenario runs and the CLI. They follow simple, inspectable rules and can be
//! scripted per step.

mod decomposer;
mod evaluator;
mod planner;
mod summarizer;

pub use decomposer::RuleBasedDecomposer;
pub use evaluator::RuleBasedEvaluator;
pub use planner::ScriptedPlanner;
pub use summarizer::TemplateSummarizer;
