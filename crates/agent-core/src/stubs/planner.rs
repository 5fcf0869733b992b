use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise_core_types::SurfaceSnapshot;
use tracing::debug;

use crate::errors::AgentError;
use crate::model::{Goal, Plan};
use crate::ports::{Planner, ReplanContext};

/// Planner that replays a fixed initial plan and a queue of continuations.
///
/// Every replan request is recorded so callers can inspect what the planner saw.
#[derive(Debug)]
pub struct ScriptedPlanner {
    initial: Plan,
    continuations: Mutex<VecDeque<Plan>>,
    retry_failed_step: bool,
    requests: Mutex<Vec<ReplanContext>>,
}

impl ScriptedPlanner {
    pub fn new(initial: Plan) -> Self {
        Self {
            initial,
            continuations: Mutex::new(VecDeque::new()),
            retry_failed_step: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a continuation; continuations are handed out in order.
    pub fn with_continuation(self, plan: Plan) -> Self {
        self.continuations.lock().push_back(plan);
        self
    }

    /// Once the queue is drained, answer replans with the failed step alone.
    pub fn retrying_failed_step(mut self, enabled: bool) -> Self {
        self.retry_failed_step = enabled;
        self
    }

    pub fn replan_requests(&self) -> Vec<ReplanContext> {
        self.requests.lock().clone()
    }

    pub fn replan_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, goal: &Goal, _snapshot: &SurfaceSnapshot) -> Result<Plan, AgentError> {
        debug!(goal = %goal, steps = self.initial.len(), "scripted plan");
        Ok(self.initial.clone())
    }

    async fn replan(&self, context: &ReplanContext) -> Result<Plan, AgentError> {
        self.requests.lock().push(context.clone());

        if let Some(plan) = self.continuations.lock().pop_front() {
            return Ok(plan);
        }
        if self.retry_failed_step {
            let retry = context.failed_step.clone().independent();
            return Ok(Plan::new(vec![retry]).with_rationale(format!(
                "retry {} (attempt {})",
                context.failed_step.id, context.attempt_number
            )));
        }
        Err(AgentError::planner(format!(
            "no continuation scripted for step {}",
            context.failed_step.id
        )))
    }
}
