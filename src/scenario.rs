//! Scenario files: a goal, a scripted surface and the plans a scripted planner replays.
//!
//! ```yaml
//! goal: Find the price of a laptop
//! surface:
//!   start: https://shop.test
//!   pages: [...]
//! plan:
//!   steps: [...]
//! continuations: []        # handed out in order on each replan
//! retry_failed_step: false # answer further replans with the failed step
//! actions: {}              # step id -> scripted action lists, one per attempt
//! evaluations: {}          # step id -> scripted evaluations, one per call
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use action_primitives::{MicroAction, ScriptedSurface, SurfaceFixture};
use agent_core::stubs::{RuleBasedDecomposer, RuleBasedEvaluator, ScriptedPlanner, TemplateSummarizer};
use agent_core::{Collaborators, Evaluation, Plan, PlanValidationIssue, PlanValidator};
use serde::{Deserialize, Serialize};
use stepwise_core_types::StepId;

use crate::errors::StepwiseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub goal: String,
    pub surface: SurfaceFixture,
    pub plan: Plan,
    #[serde(default)]
    pub continuations: Vec<Plan>,
    #[serde(default)]
    pub retry_failed_step: bool,
    #[serde(default)]
    pub actions: BTreeMap<StepId, Vec<Vec<MicroAction>>>,
    #[serde(default)]
    pub evaluations: BTreeMap<StepId, Vec<Evaluation>>,
}

/// A validation finding for one of the scenario's plans.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioIssue {
    /// `plan` or `continuation N` (1-based).
    pub location: String,
    pub issue: PlanValidationIssue,
}

impl ScenarioIssue {
    pub fn is_fatal(&self) -> bool {
        self.issue.is_fatal()
    }
}

impl std::fmt::Display for ScenarioIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.issue)
    }
}

impl Scenario {
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self, StepwiseError> {
        let scenario: Scenario =
            serde_yaml::from_str(content).map_err(|err| StepwiseError::yaml(origin, err))?;
        if scenario.goal.trim().is_empty() {
            return Err(StepwiseError::Scenario("goal must not be empty".to_string()));
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, StepwiseError> {
        let content = fs::read_to_string(path).map_err(|err| StepwiseError::io(path, err))?;
        Self::from_yaml_str(&content, path)
    }

    /// Check the initial plan and every continuation.
    ///
    /// Continuations may depend on any step id declared earlier in the scenario.
    pub fn validate(&self, max_plan_steps: usize) -> Vec<ScenarioIssue> {
        let validator = PlanValidator::new(max_plan_steps);
        let mut known: BTreeSet<StepId> = BTreeSet::new();
        let mut issues = Vec::new();

        let plans = std::iter::once(("plan".to_string(), &self.plan)).chain(
            self.continuations
                .iter()
                .enumerate()
                .map(|(index, plan)| (format!("continuation {}", index + 1), plan)),
        );
        for (location, plan) in plans {
            issues.extend(
                validator
                    .issues(plan, &known)
                    .into_iter()
                    .map(|issue| ScenarioIssue {
                        location: location.clone(),
                        issue,
                    }),
            );
            known.extend(plan.steps.iter().map(|step| step.id.clone()));
        }
        issues
    }

    pub fn surface(&self) -> Result<Arc<ScriptedSurface>, StepwiseError> {
        Ok(Arc::new(ScriptedSurface::new(self.surface.clone())?))
    }

    pub fn planner(&self) -> ScriptedPlanner {
        self.continuations.iter().cloned().fold(
            ScriptedPlanner::new(self.plan.clone()).retrying_failed_step(self.retry_failed_step),
            ScriptedPlanner::with_continuation,
        )
    }

    /// Deterministic collaborators primed with the scenario's scripts.
    pub fn collaborators(&self) -> Collaborators {
        let decomposer = self
            .actions
            .iter()
            .flat_map(|(step, attempts)| attempts.iter().map(move |actions| (step, actions)))
            .fold(RuleBasedDecomposer::new(), |decomposer, (step, actions)| {
                decomposer.with_actions(step.clone(), actions.clone())
            });
        let evaluator = self
            .evaluations
            .iter()
            .flat_map(|(step, evaluations)| evaluations.iter().map(move |evaluation| (step, evaluation)))
            .fold(RuleBasedEvaluator::new(), |evaluator, (step, evaluation)| {
                evaluator.with_evaluation(step.clone(), evaluation.clone())
            });

        Collaborators {
            planner: Arc::new(self.planner()),
            decomposer: Arc::new(decomposer),
            evaluator: Arc::new(evaluator),
            summarizer: Some(Arc::new(TemplateSummarizer)),
        }
    }
}
