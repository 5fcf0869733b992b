//! Structural checks applied to every plan and continuation before it is queued.

use std::collections::{BTreeMap, BTreeSet};

use stepwise_core_types::StepId;
use thiserror::Error;

use crate::model::Plan;

pub const DEFAULT_MAX_PLAN_STEPS: usize = 7;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanValidationIssue {
    #[error("plan has no steps")]
    Empty,
    #[error("plan has {count} steps; only the first {max} are kept")]
    TooManySteps { count: usize, max: usize },
    #[error("a step has a blank id")]
    BlankId,
    #[error("step id '{0}' appears more than once")]
    DuplicateStepId(StepId),
    #[error("step '{0}' depends on itself")]
    SelfDependency(StepId),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: StepId, dependency: StepId },
    #[error("dependency cycle through step '{0}'")]
    DependencyCycle(StepId),
}

impl PlanValidationIssue {
    /// Oversized plans are truncated; everything else rejects the plan.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PlanValidationIssue::TooManySteps { .. })
    }
}

/// A plan that passed validation, plus any non-fatal findings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: Plan,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlanValidator {
    max_steps: usize,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAN_STEPS)
    }
}

impl PlanValidator {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Every issue found in `plan`. `external` lists ids outside the plan that
    /// dependencies may legitimately point at (steps already known to the run).
    pub fn issues(&self, plan: &Plan, external: &BTreeSet<StepId>) -> Vec<PlanValidationIssue> {
        let mut issues = Vec::new();
        if plan.is_empty() {
            issues.push(PlanValidationIssue::Empty);
            return issues;
        }
        if plan.len() > self.max_steps {
            issues.push(PlanValidationIssue::TooManySteps {
                count: plan.len(),
                max: self.max_steps,
            });
        }

        let mut seen = BTreeSet::new();
        for step in &plan.steps {
            if step.id.as_str().trim().is_empty() {
                issues.push(PlanValidationIssue::BlankId);
            } else if !seen.insert(step.id.clone()) {
                issues.push(PlanValidationIssue::DuplicateStepId(step.id.clone()));
            }
        }

        for step in &plan.steps {
            for dependency in step.depends_on.iter().flatten() {
                if dependency == &step.id {
                    issues.push(PlanValidationIssue::SelfDependency(step.id.clone()));
                } else if !seen.contains(dependency) && !external.contains(dependency) {
                    issues.push(PlanValidationIssue::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        if issues.iter().all(|issue| !issue.is_fatal()) {
            if let Some(step) = find_cycle(plan) {
                issues.push(PlanValidationIssue::DependencyCycle(step));
            }
        }
        issues
    }

    /// Truncate oversized plans and reject structurally broken ones.
    pub fn validate(
        &self,
        mut plan: Plan,
        external: &BTreeSet<StepId>,
    ) -> Result<ValidatedPlan, PlanValidationIssue> {
        let mut warnings = Vec::new();
        if plan.len() > self.max_steps {
            warnings.push(
                PlanValidationIssue::TooManySteps {
                    count: plan.len(),
                    max: self.max_steps,
                }
                .to_string(),
            );
            plan.steps.truncate(self.max_steps);
        }

        match self
            .issues(&plan, external)
            .into_iter()
            .find(PlanValidationIssue::is_fatal)
        {
            Some(issue) => Err(issue),
            None => Ok(ValidatedPlan { plan, warnings }),
        }
    }
}

/// First step found on a dependency cycle, with `None` meaning "previous step".
fn find_cycle(plan: &Plan) -> Option<StepId> {
    let mut edges: BTreeMap<&StepId, Vec<&StepId>> = BTreeMap::new();
    let mut previous: Option<&StepId> = None;
    for step in &plan.steps {
        let deps: Vec<&StepId> = match &step.depends_on {
            Some(deps) => deps.iter().collect(),
            None => previous.into_iter().collect(),
        };
        edges.insert(&step.id, deps);
        previous = Some(&step.id);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a StepId,
        edges: &BTreeMap<&'a StepId, Vec<&'a StepId>>,
        marks: &mut BTreeMap<&'a StepId, Mark>,
    ) -> Option<StepId> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => return Some(node.clone()),
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        for next in edges.get(node).into_iter().flatten() {
            if let Some(found) = visit(*next, edges, marks) {
                return Some(found);
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    plan.steps
        .iter()
        .find_map(|step| visit(&step.id, &edges, &mut marks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Step;

    fn plan(steps: Vec<Step>) -> Plan {
        Plan::new(steps)
    }

    #[test]
    fn truncates_oversized_plans_with_warning() {
        let steps = (0..9).map(|i| Step::new(format!("s{i}"), "step")).collect();
        let validated = PlanValidator::default()
            .validate(plan(steps), &BTreeSet::new())
            .unwrap();
        assert_eq!(validated.plan.len(), 7);
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        let validator = PlanValidator::default();
        assert_eq!(
            validator.validate(Plan::default(), &BTreeSet::new()).unwrap_err(),
            PlanValidationIssue::Empty
        );
        let err = validator
            .validate(
                plan(vec![Step::new("a", "x"), Step::new("a", "y")]),
                &BTreeSet::new(),
            )
            .unwrap_err();
        assert_eq!(err, PlanValidationIssue::DuplicateStepId(StepId::new("a")));
    }

    #[test]
    fn dependencies_must_resolve() {
        let validator = PlanValidator::default();
        let candidate = plan(vec![Step::new("b", "x").depends_on(["a"])]);

        assert!(matches!(
            validator.validate(candidate.clone(), &BTreeSet::new()),
            Err(PlanValidationIssue::UnknownDependency { .. })
        ));
        let external = BTreeSet::from([StepId::new("a")]);
        assert!(validator.validate(candidate, &external).is_ok());
    }

    #[test]
    fn detects_cycles() {
        let candidate = plan(vec![
            Step::new("a", "x").depends_on(["b"]),
            Step::new("b", "y"),
        ]);
        assert!(matches!(
            PlanValidator::default().validate(candidate, &BTreeSet::new()),
            Err(PlanValidationIssue::DependencyCycle(_))
        ));
    }

    #[test]
    fn issues_reports_everything() {
        let steps = vec![
            Step::new("a", "x").depends_on(["a"]),
            Step::new("a", "y"),
            Step::new("c", "z").depends_on(["ghost"]),
        ];
        let issues = PlanValidator::new(2).issues(&plan(steps), &BTreeSet::new());
        assert_eq!(issues.len(), 4);
        assert!(!issues[0].is_fatal());
    }
}
