//! Micro-action executor
//!
//! Action families:
//! 1. interact - click, fill, clear, hover, select, drag (element-targeted)
//! 2. navigate - navigate and scroll
//! 3. extract - extract, extract_url, extract_href (read-only)
//! 4. wait - fixed waits and wait_for_element (always bounded)

mod extract;
mod interact;
mod navigate;
mod wait;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use stepwise_core_types::{ClassifiedError, Point, SurfaceSnapshot};
use tracing::{debug, info, warn};

use crate::{
    errors::ActionError,
    surface::SurfaceDriver,
    types::{ActionKind, ActionResult, Extraction, MicroAction},
    waiting::{DefaultWaitStrategy, WaitStrategy},
};

/// Timing knobs for the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Delay after a state-mutating action before the next action starts.
    /// Default: 250
    pub settle_delay_ms: u64,

    /// Timeout for wait_for_element when the action does not set one.
    /// Default: 5000
    pub default_wait_timeout_ms: u64,

    /// Hard ceiling for any wait, whatever the action asks for.
    /// Default: 30000
    pub max_wait_ms: u64,

    /// Poll interval for wait_for_element.
    /// Default: 100
    pub poll_interval_ms: u64,

    /// Timeout for non-wait actions without an explicit timeout.
    /// Default: 15000
    pub default_action_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 250,
            default_wait_timeout_ms: 5_000,
            max_wait_ms: 30_000,
            poll_interval_ms: 100,
            default_action_timeout_ms: 15_000,
        }
    }
}

impl ExecutorConfig {
    /// No settling and short waits; meant for tests and scripted surfaces.
    pub fn immediate() -> Self {
        Self {
            settle_delay_ms: 0,
            default_wait_timeout_ms: 200,
            max_wait_ms: 1_000,
            poll_interval_ms: 5,
            default_action_timeout_ms: 2_000,
        }
    }

    pub(crate) fn clamp_wait(&self, ms: u64) -> Duration {
        Duration::from_millis(ms.min(self.max_wait_ms))
    }
}

/// Outcome of running a decomposed action list for one step attempt.
#[derive(Debug, Clone, Default)]
pub struct SequenceOutcome {
    /// Actions that were attempted, in order. Stops at the first failure.
    pub executed: Vec<MicroAction>,
    pub results: Vec<ActionResult>,
    /// Non-empty extracted values keyed by extraction key.
    pub extracted: BTreeMap<String, String>,
    pub failure: Option<ClassifiedError>,
}

impl SequenceOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Executes micro-actions against a [`SurfaceDriver`].
pub struct MicroActionExecutor {
    driver: Arc<dyn SurfaceDriver>,
    wait_strategy: Arc<dyn WaitStrategy>,
    config: ExecutorConfig,
}

impl MicroActionExecutor {
    pub fn new(driver: Arc<dyn SurfaceDriver>, config: ExecutorConfig) -> Self {
        Self::with_wait_strategy(driver, config, Arc::new(DefaultWaitStrategy))
    }

    pub fn with_wait_strategy(
        driver: Arc<dyn SurfaceDriver>,
        config: ExecutorConfig,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        Self {
            driver,
            wait_strategy,
            config,
        }
    }

    pub fn driver(&self) -> &dyn SurfaceDriver {
        self.driver.as_ref()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one action without a step deadline.
    pub async fn execute(&self, action: &MicroAction, snapshot: &SurfaceSnapshot) -> ActionResult {
        self.execute_with_deadline(action, snapshot, None).await
    }

    /// Execute one action, bounded by its own timeout and the optional step deadline.
    ///
    /// Never fails: errors are classified into the returned result.
    pub async fn execute_with_deadline(
        &self,
        action: &MicroAction,
        snapshot: &SurfaceSnapshot,
        deadline: Option<Instant>,
    ) -> ActionResult {
        let started = Instant::now();
        debug!(action = %action.summary(), "executing micro-action");

        let outcome = match self.action_budget(action, deadline) {
            None => Err(ActionError::Interrupted(
                "step time budget exhausted".to_string(),
            )),
            Some(budget) => match tokio::time::timeout(budget, self.run(action, snapshot)).await {
                Ok(result) => result,
                Err(_) => Err(ActionError::Timeout(format!(
                    "{} exceeded {}ms",
                    action.summary(),
                    budget.as_millis()
                ))),
            },
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(extraction) => ActionResult::success(action, duration_ms, extraction),
            Err(err) => {
                warn!(action = %action.summary(), error = %err, "micro-action failed");
                ActionResult::failure(action, duration_ms, err.classify())
            }
        }
    }

    /// Run actions in order, stopping at the first failure.
    pub async fn execute_sequence(
        &self,
        actions: &[MicroAction],
        snapshot: &SurfaceSnapshot,
        deadline: Option<Instant>,
    ) -> SequenceOutcome {
        let mut outcome = SequenceOutcome::default();

        for (position, action) in actions.iter().enumerate() {
            let result = self.execute_with_deadline(action, snapshot, deadline).await;
            outcome.executed.push(action.clone());

            if let (Some(key), Some(value)) =
                (result.extraction_key.as_ref(), result.extracted_value())
            {
                outcome.extracted.insert(key.clone(), value.to_string());
            }

            if !result.success {
                outcome.failure = result.error.clone();
                outcome.results.push(result);
                break;
            }
            outcome.results.push(result);

            if action.action.is_mutating() && position + 1 < actions.len() {
                let delay = action
                    .timing
                    .settle_ms
                    .unwrap_or(self.config.settle_delay_ms);
                self.wait_strategy
                    .settle(&action.action, Duration::from_millis(delay))
                    .await;
            }
        }

        info!(
            attempted = outcome.executed.len(),
            planned = actions.len(),
            extracted = outcome.extracted.len(),
            ok = outcome.succeeded(),
            "micro-action sequence finished"
        );
        outcome
    }

    fn action_budget(&self, action: &MicroAction, deadline: Option<Instant>) -> Option<Duration> {
        let own = match &action.action {
            // Waits enforce their own clamp; leave headroom so they report it themselves.
            ActionKind::Wait { .. } | ActionKind::WaitForElement { .. } => {
                Duration::from_millis(self.config.max_wait_ms + 250)
            }
            _ => Duration::from_millis(
                action
                    .timing
                    .timeout_ms
                    .unwrap_or(self.config.default_action_timeout_ms),
            ),
        };
        match deadline {
            None => Some(own),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    None
                } else {
                    Some(own.min(remaining))
                }
            }
        }
    }

    async fn run(
        &self,
        action: &MicroAction,
        snapshot: &SurfaceSnapshot,
    ) -> Result<Extraction, ActionError> {
        match &action.action {
            ActionKind::Click { element } => {
                interact::click(self, snapshot, *element).await?;
            }
            ActionKind::Fill { element, value } => {
                interact::fill(self, snapshot, *element, value).await?;
            }
            ActionKind::Clear { element } => {
                interact::clear(self, snapshot, *element).await?;
            }
            ActionKind::Hover { element } => {
                interact::hover(self, snapshot, *element).await?;
            }
            ActionKind::Select { element, option } => {
                interact::select(self, snapshot, *element, option).await?;
            }
            ActionKind::Drag { element, target } => {
                interact::drag(self, snapshot, *element, *target).await?;
            }
            ActionKind::Scroll { direction, amount } => {
                navigate::scroll(self, *direction, *amount).await?;
            }
            ActionKind::Navigate { url } => {
                navigate::navigate(self, url).await?;
            }
            ActionKind::Wait { ms } => {
                wait::wait_fixed(self, *ms).await;
            }
            ActionKind::WaitForElement { query } => {
                wait::wait_for_element(self, query, action.timing.timeout_ms).await?;
            }
            ActionKind::Extract { element, key } => {
                return extract::extract_text(self, snapshot, *element, key).await;
            }
            ActionKind::ExtractUrl { key } => {
                return extract::extract_url(self, key).await;
            }
            ActionKind::ExtractHref { element, key } => {
                return extract::extract_href(self, snapshot, *element, key).await;
            }
        }
        Ok(Extraction::NotApplicable)
    }
}

/// Resolve an element index to the centre of its bounds in `snapshot`.
pub(crate) fn resolve_point(
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    action: &'static str,
) -> Result<Point, ActionError> {
    let index = element.ok_or(ActionError::MissingElementIndex(action))?;
    let element = snapshot.element(index).ok_or_else(|| {
        ActionError::ElementNotFound(format!(
            "element index {index} is not in the current snapshot"
        ))
    })?;
    let bounds = element.bounds.ok_or_else(|| {
        ActionError::ElementNotFound(format!("element index {index} has no bounds"))
    })?;
    Ok(bounds.center())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core_types::{Bounds, ElementInfo};

    fn snapshot() -> SurfaceSnapshot {
        SurfaceSnapshot::new(
            "https://example.test",
            None,
            vec![
                ElementInfo::new(0, "button").with_bounds(Bounds {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                }),
                ElementInfo::new(1, "div"),
            ],
        )
    }

    #[test]
    fn resolve_point_reports_each_failure() {
        let snapshot = snapshot();
        assert_eq!(
            resolve_point(&snapshot, Some(0), "click").unwrap(),
            Point { x: 5.0, y: 5.0 }
        );
        assert_eq!(
            resolve_point(&snapshot, None, "click").unwrap_err(),
            ActionError::MissingElementIndex("click")
        );
        assert!(matches!(
            resolve_point(&snapshot, Some(1), "click").unwrap_err(),
            ActionError::ElementNotFound(_)
        ));
        assert!(matches!(
            resolve_point(&snapshot, Some(42), "click").unwrap_err(),
            ActionError::ElementNotFound(_)
        ));
    }

    #[test]
    fn immediate_config_disables_settling() {
        let config = ExecutorConfig::immediate();
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.clamp_wait(60_000), Duration::from_millis(1_000));
    }
}
