use std::fmt;

use serde::{Deserialize, Serialize};
use stepwise_core_types::StepId;

/// Natural-language objective for one workflow run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Goal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Goal {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a step is trying to achieve on the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepIntent {
    Navigate,
    #[default]
    Interact,
    Search,
    Filter,
    Extract,
    Verify,
}

fn default_priority() -> i32 {
    5
}

fn default_max_attempts() -> u32 {
    2
}

/// One strategic unit of a plan.
///
/// Steps are never mutated after creation; replanning produces new steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub description: String,
    /// Concept the step acts on: a url, an element label, a search term or a data key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub intent: StepIntent,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptable_alternatives: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_evidence: Vec<String>,
    /// `None` depends on the previous step of the same plan; `Some([])` is independent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<StepId>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub allow_partial: bool,
}

impl Step {
    pub fn new(id: impl Into<StepId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            target: None,
            intent: StepIntent::default(),
            expected_outcome: String::new(),
            acceptable_alternatives: Vec::new(),
            required_evidence: Vec::new(),
            optional_evidence: Vec::new(),
            depends_on: None,
            priority: default_priority(),
            max_attempts: default_max_attempts(),
            min_confidence: None,
            timeout_ms: None,
            allow_partial: false,
        }
    }

    pub fn with_intent(mut self, intent: StepIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn expecting(mut self, outcome: impl Into<String>) -> Self {
        self.expected_outcome = outcome.into();
        self
    }

    pub fn with_alternative(mut self, alternative: impl Into<String>) -> Self {
        self.acceptable_alternatives.push(alternative.into());
        self
    }

    pub fn requiring(mut self, evidence: impl Into<String>) -> Self {
        self.required_evidence.push(evidence.into());
        self
    }

    pub fn with_optional_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.optional_evidence.push(evidence.into());
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        self.depends_on = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    pub fn independent(mut self) -> Self {
        self.depends_on = Some(Vec::new());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn allow_partial(mut self, allowed: bool) -> Self {
        self.allow_partial = allowed;
        self
    }

    /// Copy of this step under a different id.
    pub fn renamed(&self, id: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Explicit minimum, or 0.7 / 0.6 / 0.5 for high / medium / low priority.
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence.unwrap_or(match self.priority {
            p if p >= 7 => 0.7,
            4..=6 => 0.6,
            _ => 0.5,
        })
    }
}

/// Ordered steps produced by a planner for a goal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == id)
    }
}
