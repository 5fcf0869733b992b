//! Deterministic guards applied on top of the evaluator's verdict.
//!
//! The evaluator is treated as an unreliable signal. Whatever it says, a step only
//! passes when:
//! 1. an `extract` step actually produced meaningfully keyed, non-empty data,
//! 2. the reported confidence reaches the step's minimum,
//! 3. a claimed alternative outcome is one the step listed, and partial success is
//!    allowed for the step. Such matches land in `[0.6, 0.8]` confidence.
//!
//! Evaluator evidence older than [`EVIDENCE_MAX_AGE`] is dropped from the verdict.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepwise_core_types::{ClassifiedError, ErrorKind, Evidence};
use stepwise_state_center::{is_meaningful_key, ExtractedData};

use crate::model::{Step, StepIntent};
use crate::ports::Evaluation;

pub const ALTERNATIVE_CONFIDENCE_FLOOR: f64 = 0.6;
pub const ALTERNATIVE_CONFIDENCE_CEILING: f64 = 0.8;
pub const EVIDENCE_MAX_AGE: Duration = Duration::from_secs(300);

/// Final judgement for one step attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub partial: bool,
    pub confidence: f64,
    pub reason: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub evidence: Vec<Evidence>,
    pub suggestions: Vec<String>,
    pub matched_alternative: Option<String>,
}

impl Verdict {
    /// Verdict for an attempt that failed before evaluation.
    pub fn from_error(error: &ClassifiedError) -> Self {
        Self {
            success: false,
            partial: false,
            confidence: 0.0,
            reason: Some(error.message.clone()),
            error_kind: Some(error.kind),
            evidence: Vec::new(),
            suggestions: vec![error.suggested_action.clone()],
            matched_alternative: None,
        }
    }

    pub fn failure_reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "evaluation rejected the outcome".to_string())
    }

    fn reject(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.partial = false;
        self.matched_alternative = None;
        self.reason = Some(reason.into());
        self.error_kind = Some(ErrorKind::ValidationError);
        self
    }
}

/// Lowercase alphanumeric tokens (keeping `+` and `.`), single-space separated.
pub fn normalise(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '+' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The listed alternative `claimed` refers to, if any.
pub fn listed_alternative<'a>(step: &'a Step, claimed: &str) -> Option<&'a str> {
    let claimed = normalise(claimed);
    if claimed.is_empty() {
        return None;
    }
    step.acceptable_alternatives
        .iter()
        .find(|alternative| normalise(alternative) == claimed)
        .map(String::as_str)
}

/// At least one entry with a meaningful key and a non-blank value.
pub fn has_meaningful_data(data: &ExtractedData) -> bool {
    data.iter()
        .any(|(key, value)| is_meaningful_key(key) && !value.trim().is_empty())
}

fn sanitise(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Apply the guards to `evaluation` for `step`, given the attempt's extracted data.
pub fn judge(step: &Step, evaluation: Evaluation, attempt_data: &ExtractedData) -> Verdict {
    let confidence = sanitise(evaluation.confidence);
    let mut verdict = Verdict {
        success: evaluation.success,
        partial: false,
        confidence,
        reason: evaluation.reason,
        error_kind: None,
        evidence: evaluation
            .evidence
            .into_iter()
            .filter(|evidence| evidence.is_fresh(EVIDENCE_MAX_AGE))
            .collect(),
        suggestions: evaluation.suggestions,
        matched_alternative: None,
    };

    let alternative = match evaluation.matched_alternative.as_deref() {
        Some(claimed) => match listed_alternative(step, claimed) {
            Some(listed) => Some(listed.to_string()),
            None => {
                return verdict.reject(format!(
                    "claimed alternative '{claimed}' is not listed for step {}",
                    step.id
                ))
            }
        },
        None => None,
    };

    if alternative.is_some() || evaluation.partial_success {
        if !step.allow_partial {
            return verdict.reject(format!("partial success is not allowed for step {}", step.id));
        }
        if alternative.is_some() {
            verdict.success = true;
        }
        verdict.partial = verdict.success;
    }

    if !verdict.success {
        if verdict.reason.is_none() {
            verdict.reason = Some("evaluator judged the step unsuccessful".to_string());
        }
        verdict.error_kind = Some(ErrorKind::ValidationError);
        return verdict;
    }

    if step.intent == StepIntent::Extract && !has_meaningful_data(attempt_data) {
        return verdict.reject("extraction produced no meaningful data");
    }

    let minimum = step.min_confidence();
    if confidence < minimum {
        return verdict.reject(format!(
            "confidence {confidence:.2} is below the step minimum {minimum:.2}"
        ));
    }

    if let Some(alternative) = alternative {
        verdict.confidence =
            confidence.clamp(ALTERNATIVE_CONFIDENCE_FLOOR, ALTERNATIVE_CONFIDENCE_CEILING);
        verdict.matched_alternative = Some(alternative);
    }
    verdict
}
