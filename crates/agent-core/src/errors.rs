use thiserror::Error;

/// Errors emitted by the agent-core crate and its collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    /// A plan failed validation (empty, duplicate ids, unknown dependencies, ...).
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The planner could not produce a plan or continuation.
    #[error("planner failed: {0}")]
    Planner(String),

    /// A step could not be decomposed into micro-actions.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// The evaluator could not judge a step.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The post-run summary could not be produced.
    #[error("summary failed: {0}")]
    Summary(String),
}

impl AgentError {
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }

    pub fn planner(message: impl Into<String>) -> Self {
        Self::Planner(message.into())
    }

    pub fn decomposition(message: impl Into<String>) -> Self {
        Self::Decomposition(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    pub fn summary(message: impl Into<String>) -> Self {
        Self::Summary(message.into())
    }
}

impl From<crate::plan_validator::PlanValidationIssue> for AgentError {
    fn from(issue: crate::plan_validator::PlanValidationIssue) -> Self {
        Self::InvalidPlan(issue.to_string())
    }
}
