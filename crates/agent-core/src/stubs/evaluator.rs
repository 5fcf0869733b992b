use std::collections::{HashMap, VecDeque};

use action_primitives::{ActionResult, MicroAction};
use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise_core_types::{Evidence, StepId};

use crate::errors::AgentError;
use crate::model::{Step, StepIntent};
use crate::ports::{Evaluation, Evaluator, ObservedState};

/// Judges outcomes by looking for the expected outcome on the resulting surface.
///
/// Scripted evaluations take precedence, one per call for the step, in order.
#[derive(Debug, Default)]
pub struct RuleBasedEvaluator {
    scripted: Mutex<HashMap<StepId, VecDeque<Evaluation>>>,
}

impl RuleBasedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluation(self, step: impl Into<StepId>, evaluation: Evaluation) -> Self {
        self.scripted
            .lock()
            .entry(step.into())
            .or_default()
            .push_back(evaluation);
        self
    }

    fn scripted_for(&self, step: &StepId) -> Option<Evaluation> {
        self.scripted.lock().get_mut(step)?.pop_front()
    }
}

#[async_trait]
impl Evaluator for RuleBasedEvaluator {
    async fn evaluate(
        &self,
        step: &Step,
        _before: &ObservedState,
        after: &ObservedState,
        actions: &[MicroAction],
        results: &[ActionResult],
    ) -> Result<Evaluation, AgentError> {
        if let Some(evaluation) = self.scripted_for(&step.id) {
            return Ok(evaluation);
        }
        if let Some(failed) = results.iter().find(|result| !result.success) {
            let reason = failed
                .error
                .as_ref()
                .map(|error| error.message.clone())
                .unwrap_or_else(|| "an action failed".to_string());
            return Ok(Evaluation::failure(reason));
        }
        Ok(evaluate_by_rule(step, after, actions))
    }
}

fn evaluate_by_rule(step: &Step, after: &ObservedState, actions: &[MicroAction]) -> Evaluation {
    let snapshot = &after.snapshot;
    let location = Evidence::text(format!("now at {}", snapshot.url), "surface").ok();

    let evaluation = match step.intent {
        StepIntent::Navigate => {
            let target = step.target.as_deref().unwrap_or_default();
            if !target.is_empty() && snapshot.url.starts_with(target) {
                Evaluation::success(0.9)
            } else {
                Evaluation::failure(format!("expected to reach {target}, at {}", snapshot.url))
            }
        }
        StepIntent::Extract => {
            if after.extracted_data.is_empty() {
                Evaluation::failure("nothing was extracted")
            } else {
                let keys: Vec<&str> = after.extracted_data.keys().map(String::as_str).collect();
                Evaluation::success(0.9).with_reason(format!("extracted {}", keys.join(", ")))
            }
        }
        _ => {
            let expected = step.expected_outcome.trim();
            if !expected.is_empty() && snapshot.mentions(expected) {
                Evaluation::success(0.85)
            } else if let Some(alternative) = step
                .acceptable_alternatives
                .iter()
                .find(|alternative| snapshot.mentions(alternative))
            {
                Evaluation {
                    success: false,
                    confidence: 0.7,
                    reason: Some(format!("'{expected}' not observed")),
                    partial_success: true,
                    matched_alternative: Some(alternative.clone()),
                    ..Evaluation::default()
                }
            } else if expected.is_empty() && !actions.is_empty() {
                Evaluation::success(0.75)
            } else {
                Evaluation::failure(format!("'{expected}' not observed on {}", snapshot.url))
                    .with_suggestion("try a different element or navigation path")
            }
        }
    };

    match location {
        Some(evidence) => evaluation.with_evidence(evidence),
        None => evaluation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core_types::{ElementInfo, SurfaceSnapshot};
    use stepwise_state_center::ExtractedData;

    fn observed(url: &str, texts: &[&str]) -> ObservedState {
        let elements = texts
            .iter()
            .enumerate()
            .map(|(index, text)| ElementInfo::new(index as u32, "div").with_text(*text))
            .collect();
        ObservedState::new(SurfaceSnapshot::new(url, None, elements), ExtractedData::new())
    }

    #[tokio::test]
    async fn expected_outcome_on_page_is_success() {
        let step = Step::new("s", "Search").expecting("results for laptop");
        let after = observed("https://shop.test/results", &["12 results for laptop"]);
        let evaluation = RuleBasedEvaluator::new()
            .evaluate(&step, &after, &after, &[MicroAction::click(1)], &[])
            .await
            .unwrap();
        assert!(evaluation.success);
        assert_eq!(evaluation.confidence, 0.85);
    }

    #[tokio::test]
    async fn alternative_is_reported_as_failure_with_match() {
        let step = Step::new("s", "Search")
            .expecting("results for laptop")
            .with_alternative("no results");
        let after = observed("https://shop.test/results", &["Sorry, no results"]);
        let evaluation = RuleBasedEvaluator::new()
            .evaluate(&step, &after, &after, &[], &[])
            .await
            .unwrap();
        assert!(!evaluation.success);
        assert_eq!(evaluation.matched_alternative.as_deref(), Some("no results"));
    }

    #[tokio::test]
    async fn scripted_evaluations_win() {
        let evaluator =
            RuleBasedEvaluator::new().with_evaluation("s", Evaluation::failure("scripted"));
        let step = Step::new("s", "x");
        let after = observed("https://shop.test", &[]);
        let evaluation = evaluator.evaluate(&step, &after, &after, &[], &[]).await.unwrap();
        assert_eq!(evaluation.reason.as_deref(), Some("scripted"));
    }
}
