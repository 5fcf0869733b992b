use std::collections::{HashMap, VecDeque};

use action_primitives::{ActionKind, MicroAction};
use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise_core_types::{ElementInfo, StepId, SurfaceSnapshot};
use tracing::debug;

use crate::errors::AgentError;
use crate::model::{Step, StepIntent};
use crate::ports::{Decomposer, MemoryHints};

/// Turns steps into micro-actions by matching the step target against element labels.
///
/// | intent   | actions                                                      |
/// |----------|--------------------------------------------------------------|
/// | navigate | `navigate(target)`                                           |
/// | search   | `fill(search input, target)`, `click(search button)`         |
/// | interact | `click(element labelled target)`                             |
/// | filter   | `select(label, option)` for `label=option`, else `click`     |
/// | extract  | one extraction per required evidence key (or the target)     |
/// | verify   | `wait_for_element(target or expected outcome)`               |
///
/// Scripted action lists take precedence, one per attempt, in order.
#[derive(Debug, Default)]
pub struct RuleBasedDecomposer {
    scripted: Mutex<HashMap<StepId, VecDeque<Vec<MicroAction>>>>,
}

impl RuleBasedDecomposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `actions` for the next attempt of `step` instead of the rules.
    pub fn with_actions(self, step: impl Into<StepId>, actions: Vec<MicroAction>) -> Self {
        self.scripted
            .lock()
            .entry(step.into())
            .or_default()
            .push_back(actions);
        self
    }

    fn scripted_for(&self, step: &StepId) -> Option<Vec<MicroAction>> {
        self.scripted.lock().get_mut(step)?.pop_front()
    }
}

#[async_trait]
impl Decomposer for RuleBasedDecomposer {
    async fn decompose(
        &self,
        step: &Step,
        snapshot: &SurfaceSnapshot,
        hints: &MemoryHints,
    ) -> Result<Vec<MicroAction>, AgentError> {
        if let Some(actions) = self.scripted_for(&step.id) {
            debug!(step = %step.id, actions = actions.len(), "scripted actions");
            return Ok(actions);
        }
        debug!(
            step = %step.id,
            intent = ?step.intent,
            known_keys = hints.known_keys.len(),
            failed_approaches = hints.failed_approaches.len(),
            "decomposing by rule"
        );
        decompose_by_rule(step, snapshot)
    }
}

fn decompose_by_rule(step: &Step, snapshot: &SurfaceSnapshot) -> Result<Vec<MicroAction>, AgentError> {
    match step.intent {
        StepIntent::Navigate => {
            let url = target(step)?;
            Ok(vec![MicroAction::navigate(url)])
        }
        StepIntent::Search => {
            let term = target(step)?;
            let input = snapshot
                .elements
                .iter()
                .find(|element| is_text_input(element))
                .ok_or_else(|| not_found(step, "search input"))?;
            let button = snapshot
                .elements
                .iter()
                .find(|element| is_button(element) && element.matches_label("search"))
                .or_else(|| snapshot.elements.iter().find(|element| is_button(element)))
                .ok_or_else(|| not_found(step, "search button"))?;
            Ok(vec![
                MicroAction::fill(input.index, term),
                MicroAction::click(button.index),
            ])
        }
        StepIntent::Interact => {
            let label = target(step)?;
            let element = snapshot
                .find_by_label(label)
                .ok_or_else(|| not_found(step, label))?;
            Ok(vec![MicroAction::click(element.index)])
        }
        StepIntent::Filter => {
            let filter = target(step)?;
            match filter.split_once('=') {
                Some((label, option)) => {
                    let element = snapshot
                        .find_by_label(label.trim())
                        .ok_or_else(|| not_found(step, label.trim()))?;
                    Ok(vec![MicroAction::new(ActionKind::Select {
                        element: Some(element.index),
                        option: option.trim().to_string(),
                    })])
                }
                None => {
                    let element = snapshot
                        .find_by_label(filter)
                        .ok_or_else(|| not_found(step, filter))?;
                    Ok(vec![MicroAction::click(element.index)])
                }
            }
        }
        StepIntent::Extract => {
            let keys: Vec<&str> = if step.required_evidence.is_empty() {
                vec![target(step)?]
            } else {
                step.required_evidence.iter().map(String::as_str).collect()
            };
            keys.into_iter()
                .map(|key| extraction_for(step, snapshot, key))
                .collect()
        }
        StepIntent::Verify => {
            let query = step
                .target
                .as_deref()
                .filter(|target| !target.trim().is_empty())
                .unwrap_or(step.expected_outcome.as_str());
            if query.trim().is_empty() {
                return Err(AgentError::decomposition(format!(
                    "step {} has nothing to verify",
                    step.id
                )));
            }
            Ok(vec![MicroAction::new(ActionKind::WaitForElement {
                query: query.to_string(),
            })])
        }
    }
}

/// `url`-like keys read the location; `link`/`href` keys read an anchor; the rest read text.
fn extraction_for(step: &Step, snapshot: &SurfaceSnapshot, key: &str) -> Result<MicroAction, AgentError> {
    let lower = key.to_ascii_lowercase();
    if lower == "url" || lower.ends_with("_url") {
        return Ok(MicroAction::extract_url(key));
    }
    let element = snapshot
        .elements
        .iter()
        .find(|element| element.attribute("data-field") == Some(key))
        .or_else(|| snapshot.find_by_label(&key.replace('_', " ")))
        .ok_or_else(|| not_found(step, key))?;
    if lower.ends_with("link") || lower.ends_with("href") {
        return Ok(MicroAction::new(ActionKind::ExtractHref {
            element: Some(element.index),
            key: key.to_string(),
        }));
    }
    Ok(MicroAction::extract(element.index, key))
}

fn target(step: &Step) -> Result<&str, AgentError> {
    step.target
        .as_deref()
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| AgentError::decomposition(format!("step {} has no target", step.id)))
}

fn is_text_input(element: &ElementInfo) -> bool {
    let tag = element.tag.to_ascii_lowercase();
    let role = element.role.as_deref().unwrap_or_default();
    (tag == "input" && element.attribute("type").map_or(true, |kind| kind == "text" || kind == "search"))
        || tag == "textarea"
        || role == "searchbox"
        || role == "textbox"
}

fn is_button(element: &ElementInfo) -> bool {
    element.tag.eq_ignore_ascii_case("button") || element.role.as_deref() == Some("button")
}

fn not_found(step: &Step, what: &str) -> AgentError {
    AgentError::decomposition(format!("element '{what}' not found for step {}", step.id))
}
