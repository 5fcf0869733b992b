//! Configuration for workflow runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Budgets and limits for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Replans allowed for one step slot before degrading or aborting.
    /// Default: 3
    pub max_replans_per_step: u32,

    /// Replans allowed across the whole run.
    /// Default: 10
    pub max_total_replans: u32,

    /// Accept an exhausted step as degraded instead of aborting the run.
    /// Default: true
    pub enable_degradation: bool,

    /// Time budget for one step attempt when the step sets none.
    /// Default: 60000 (60 seconds)
    pub default_step_timeout_ms: u64,

    /// Plans and continuations are truncated to this many steps.
    /// Default: 7
    pub max_plan_steps: usize,

    /// Checkpoints kept per run.
    /// Default: 5
    pub checkpoint_retention: usize,

    /// Classified page states kept per run.
    /// Default: 10
    pub page_state_history: usize,

    /// When set, checkpoints are mirrored under `<dir>/<workflow id>/`.
    /// Default: None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_replans_per_step: 3,
            max_total_replans: 10,
            enable_degradation: true,
            default_step_timeout_ms: 60_000,
            max_plan_steps: 7,
            checkpoint_retention: 5,
            page_state_history: 10,
            checkpoint_dir: None,
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small budgets and short timeouts for tests.
    pub fn minimal() -> Self {
        Self {
            max_replans_per_step: 2,
            max_total_replans: 4,
            enable_degradation: true,
            default_step_timeout_ms: 5_000,
            max_plan_steps: 7,
            checkpoint_retention: 3,
            page_state_history: 5,
            checkpoint_dir: None,
        }
    }

    /// Builder: set the per-step replan budget.
    pub fn max_replans_per_step(mut self, replans: u32) -> Self {
        self.max_replans_per_step = replans;
        self
    }

    /// Builder: set the global replan budget.
    pub fn max_total_replans(mut self, replans: u32) -> Self {
        self.max_total_replans = replans;
        self
    }

    /// Builder: enable or disable degradation.
    pub fn degradation(mut self, enabled: bool) -> Self {
        self.enable_degradation = enabled;
        self
    }

    pub fn step_timeout(mut self, ms: u64) -> Self {
        self.default_step_timeout_ms = ms;
        self
    }

    pub fn max_plan_steps(mut self, steps: usize) -> Self {
        self.max_plan_steps = steps;
        self
    }

    pub fn checkpoint_retention(mut self, retained: usize) -> Self {
        self.checkpoint_retention = retained;
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Upper bound on step dispatches for a run whose initial plan has `initial_steps`.
    pub fn dispatch_limit(&self, initial_steps: usize) -> usize {
        initial_steps + self.max_total_replans as usize * self.max_plan_steps.max(1)
    }
}
