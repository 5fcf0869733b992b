//! Workflow controller - the bounded plan/execute/evaluate/replan loop.
//!
//! One [`WorkflowOrchestrator`] drives exactly one run. It owns the task queue, the
//! state accumulator and the per-slot replan counters and ledgers; nothing is shared
//! across runs.
//!
//! A *slot* is a position in the plan that has to be filled. The first step of a
//! continuation plan inherits the slot of the step whose failure triggered it, so
//! the slot's replan counter and failed-approach ledger survive replanning while
//! the failed step itself is never mutated.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_primitives::{ActionError, ActionResult, MicroAction, MicroActionExecutor, SnapshotProvider};
use stepwise_core_types::{ClassifiedError, ErrorKind, StepId, SurfaceSnapshot, WorkflowId};
use stepwise_scheduler::{QueuedTask, SchedulerError, TaskQueue};
use stepwise_state_center::{AccumulatorConfig, ExtractedData, StateAccumulator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::WorkflowConfig;
use super::types::{
    EvidenceBundle, Phase, StepResult, StepStatus, SummaryInput, WorkflowResult, WorkflowStatus,
};
use crate::judge::{judge, Verdict};
use crate::model::{Goal, Step};
use crate::plan_validator::PlanValidator;
use crate::ports::{Decomposer, Evaluator, MemoryHints, ObservedState, Planner, ReplanContext, Summarizer};

/// External decision makers used by a run.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub decomposer: Arc<dyn Decomposer>,
    pub evaluator: Arc<dyn Evaluator>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Succeeded,
    Partial,
    Failed,
    /// Removed unexecuted when a continuation replaced the remainder.
    Dropped,
}

#[derive(Debug, Clone)]
struct Slot {
    opened_by: StepId,
    state: SlotState,
    replans: u32,
    ledger: Vec<String>,
    confidence: f64,
}

impl Slot {
    fn new(opened_by: StepId) -> Self {
        Self {
            opened_by,
            state: SlotState::Pending,
            replans: 0,
            ledger: Vec::new(),
            confidence: 0.0,
        }
    }

    fn counts_as_done(&self) -> bool {
        matches!(self.state, SlotState::Succeeded | SlotState::Partial)
    }
}

/// One step attempt as handed from execution to evaluation.
struct Attempt {
    step: Step,
    slot: usize,
    started: Instant,
    /// End of the step's time budget, shared by every attempt and the evaluation.
    deadline: Instant,
    attempts: u32,
    before: ObservedState,
    after: ObservedState,
    actions: Vec<MicroAction>,
    results: Vec<ActionResult>,
    extracted: ExtractedData,
    failure: Option<ClassifiedError>,
}

struct Judged {
    attempt: Attempt,
    verdict: Verdict,
}

/// State machine transitions; each carries what the next phase needs.
enum Transition {
    Plan,
    Dispatch,
    Evaluate(Box<Attempt>),
    Advance(Box<Judged>),
    Replan(Box<Judged>),
    Degrade(Box<Judged>),
    Complete,
    Abort(String),
}

impl Transition {
    fn phase(&self) -> Phase {
        match self {
            Transition::Plan => Phase::Planning,
            Transition::Dispatch => Phase::ExecutingStep,
            Transition::Evaluate(_) => Phase::Evaluating,
            Transition::Advance(_) => Phase::StepAdvance,
            Transition::Replan(_) => Phase::Replanning,
            Transition::Degrade(_) => Phase::Degrading,
            Transition::Complete => Phase::Completed,
            Transition::Abort(_) => Phase::Aborted,
        }
    }
}

/// Mutable per-run state. Built fresh by [`WorkflowOrchestrator::run`].
struct RunState {
    queue: TaskQueue<Step>,
    accumulator: StateAccumulator,
    slots: Vec<Slot>,
    slot_of: HashMap<StepId, usize>,
    /// Every id ever enqueued in this run.
    seen_ids: BTreeSet<StepId>,
    dispatched: Vec<Step>,
    completed_steps: Vec<Step>,
    step_results: Vec<StepResult>,
    degraded: Vec<StepId>,
    replans_total: u32,
    dispatches: usize,
    dispatch_limit: usize,
    unmet: BTreeMap<StepId, Vec<StepId>>,
    errors: Vec<String>,
}

impl RunState {
    fn new(config: &WorkflowConfig, id: &WorkflowId) -> Self {
        let mut accumulator_config = AccumulatorConfig {
            checkpoint_retention: config.checkpoint_retention,
            page_state_history: config.page_state_history,
            ..AccumulatorConfig::default()
        };
        if let Some(dir) = &config.checkpoint_dir {
            accumulator_config = accumulator_config.with_persistence(dir.clone(), id.to_string());
        }
        Self {
            queue: TaskQueue::new(),
            accumulator: StateAccumulator::new(accumulator_config),
            slots: Vec::new(),
            slot_of: HashMap::new(),
            seen_ids: BTreeSet::new(),
            dispatched: Vec::new(),
            completed_steps: Vec::new(),
            step_results: Vec::new(),
            degraded: Vec::new(),
            replans_total: 0,
            dispatches: 0,
            dispatch_limit: 0,
            unmet: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Queue `steps`; `None` dependencies resolve to the previous step of the same plan.
    ///
    /// With `inherit`, the first step takes over that slot and goes in the priority lane.
    fn enqueue_plan(&mut self, steps: Vec<Step>, inherit: Option<usize>) -> Result<(), SchedulerError> {
        let mut previous: Option<StepId> = None;
        for (position, step) in steps.into_iter().enumerate() {
            let dependencies = match &step.depends_on {
                Some(dependencies) => dependencies.clone(),
                None => previous.iter().cloned().collect(),
            };
            let inherited = if position == 0 { inherit } else { None };
            let slot = match inherited {
                Some(slot) => slot,
                None => {
                    self.slots.push(Slot::new(step.id.clone()));
                    self.slots.len() - 1
                }
            };

            self.slot_of.insert(step.id.clone(), slot);
            self.seen_ids.insert(step.id.clone());
            previous = Some(step.id.clone());

            let task = QueuedTask::new(step.id.clone(), step.clone())
                .with_priority(step.priority)
                .with_dependencies(dependencies);
            if inherited.is_some() {
                self.queue.enqueue_priority(task)?;
            } else {
                self.queue.enqueue(task)?;
            }
        }
        Ok(())
    }

    fn live_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.state != SlotState::Dropped)
    }
}

/// Give continuation steps ids that are unused in this run.
///
/// A colliding id `x` (or `x-rN`) becomes `x-rM` for the smallest free `M`, and
/// dependencies inside the continuation follow the rename.
fn rename_collisions(steps: Vec<Step>, seen: &BTreeSet<StepId>) -> Vec<Step> {
    let mut taken: BTreeSet<StepId> = seen.clone();
    taken.extend(steps.iter().map(|step| step.id.clone()));
    let mut renames: HashMap<StepId, StepId> = HashMap::new();

    let mut renamed: Vec<Step> = steps
        .into_iter()
        .map(|step| {
            if !seen.contains(&step.id) {
                return step;
            }
            let base = retry_base(step.id.as_str()).to_string();
            let fresh = (1..)
                .map(|n| StepId::new(format!("{base}-r{n}")))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| StepId::new(format!("{base}-r")));
            taken.insert(fresh.clone());
            renames.insert(step.id.clone(), fresh.clone());
            step.renamed(fresh)
        })
        .collect();

    if !renames.is_empty() {
        for step in &mut renamed {
            if let Some(dependencies) = step.depends_on.as_mut() {
                for dependency in dependencies.iter_mut() {
                    if let Some(fresh) = renames.get(dependency) {
                        *dependency = fresh.clone();
                    }
                }
            }
        }
    }
    renamed
}

/// `search-r2` -> `search`; ids without a retry suffix are returned unchanged.
fn retry_base(id: &str) -> &str {
    match id.rsplit_once("-r") {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => base,
        _ => id,
    }
}

fn ledger_entry(number: usize, step: &Step, actions: &[MicroAction], reason: &str) -> String {
    let actions: Vec<String> = actions.iter().map(MicroAction::summary).collect();
    format!(
        "attempt {number}: {} via [{}] failed: {reason}",
        step.description,
        actions.join(", ")
    )
}

/// Drives one workflow run from goal to [`WorkflowResult`].
pub struct WorkflowOrchestrator {
    id: WorkflowId,
    config: WorkflowConfig,
    collaborators: Collaborators,
    surface: Arc<dyn SnapshotProvider>,
    executor: MicroActionExecutor,
    validator: PlanValidator,
    cancel: CancellationToken,
}

impl WorkflowOrchestrator {
    pub fn new(
        config: WorkflowConfig,
        collaborators: Collaborators,
        surface: Arc<dyn SnapshotProvider>,
        executor: MicroActionExecutor,
    ) -> Self {
        let validator = PlanValidator::new(config.max_plan_steps);
        Self {
            id: WorkflowId::new(),
            config,
            collaborators,
            surface,
            executor,
            validator,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_id(mut self, id: WorkflowId) -> Self {
        self.id = id;
        self
    }

    /// Use an externally owned token; cancelling it aborts the run at the next transition.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Await a collaborator call unless the run is cancelled first.
    async fn unless_cancelled<F: Future>(&self, call: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = call => Some(output),
        }
    }

    /// Run the workflow to completion. Always yields exactly one result.
    pub async fn run(self, goal: impl Into<Goal>) -> WorkflowResult {
        let goal = goal.into();
        let started = Instant::now();
        let mut run = RunState::new(&self.config, &self.id);
        info!(workflow = %self.id, goal = %goal, "workflow started");

        let mut phase = Phase::Idle;
        let mut next = Transition::Plan;
        let abort_reason = loop {
            if self.cancel.is_cancelled()
                && !matches!(next, Transition::Complete | Transition::Abort(_))
            {
                next = Transition::Abort("cancelled".to_string());
            }
            debug!(from = ?phase, to = ?next.phase(), "transition");
            phase = next.phase();

            next = match next {
                Transition::Plan => self.plan(&goal, &mut run).await,
                Transition::Dispatch => self.dispatch(&mut run).await,
                Transition::Evaluate(attempt) => self.evaluate(*attempt, &mut run).await,
                Transition::Advance(judged) => self.advance(*judged, &mut run),
                Transition::Replan(judged) => self.replan(&goal, *judged, &mut run).await,
                Transition::Degrade(judged) => self.degrade(*judged, &mut run),
                Transition::Complete => break None,
                Transition::Abort(reason) => break Some(reason),
            };
        };

        self.finish(goal, run, phase, abort_reason, started).await
    }

    async fn plan(&self, goal: &Goal, run: &mut RunState) -> Transition {
        let snapshot = match self.unless_cancelled(self.surface.snapshot()).await {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(err)) => return Transition::Abort(format!("initial snapshot failed: {err}")),
            None => return Transition::Abort("cancelled".to_string()),
        };
        run.accumulator.record_page_state(&snapshot);

        let planned = self
            .unless_cancelled(self.collaborators.planner.plan(goal, &snapshot))
            .await;
        let plan = match planned {
            Some(Ok(plan)) => plan,
            Some(Err(err)) => return Transition::Abort(format!("planning failed: {err}")),
            None => return Transition::Abort("cancelled".to_string()),
        };
        let validated = match self.validator.validate(plan, &BTreeSet::new()) {
            Ok(validated) => validated,
            Err(issue) => return Transition::Abort(format!("initial plan rejected: {issue}")),
        };
        for warning in &validated.warnings {
            warn!(warning = %warning, "initial plan adjusted");
        }

        let steps = validated.plan.steps;
        run.dispatch_limit = self.config.dispatch_limit(steps.len());
        info!(steps = steps.len(), dispatch_limit = run.dispatch_limit, "plan accepted");
        if let Err(err) = run.enqueue_plan(steps, None) {
            return Transition::Abort(format!("initial plan could not be queued: {err}"));
        }
        Transition::Dispatch
    }

    async fn dispatch(&self, run: &mut RunState) -> Transition {
        let Some(task) = run.queue.dequeue() else {
            if run.queue.is_empty() {
                return Transition::Complete;
            }
            let blocked: Vec<(StepId, Vec<StepId>)> = run
                .queue
                .blocked_tasks()
                .into_iter()
                .map(|task| (task.id.clone(), run.queue.unmet_dependencies(task)))
                .collect();
            let detail: Vec<String> = blocked
                .iter()
                .map(|(id, unmet)| {
                    let unmet: Vec<&str> = unmet.iter().map(StepId::as_str).collect();
                    format!("{id} waits on [{}]", unmet.join(", "))
                })
                .collect();
            run.unmet.extend(blocked);
            return Transition::Abort(format!("no runnable step: {}", detail.join("; ")));
        };

        if run.dispatches >= run.dispatch_limit {
            return Transition::Abort(format!(
                "dispatch limit of {} steps reached",
                run.dispatch_limit
            ));
        }
        run.dispatches += 1;

        let step = task.payload;
        let Some(slot) = run.slot_of.get(&step.id).copied() else {
            return Transition::Abort(format!("step {} has no plan slot", step.id));
        };
        run.dispatched.push(step.clone());
        info!(step = %step.id, slot, priority = step.priority, "executing step");

        let attempt = self.execute_step(step, slot, run).await;
        Transition::Evaluate(Box::new(attempt))
    }

    /// Run attempts of `step`, retrying recoverable failures up to `max_attempts`.
    ///
    /// All attempts share one time budget measured from the first attempt's start.
    /// A recoverable failure with no budget left ends the step as a `timeout`.
    async fn execute_step(&self, step: Step, slot: usize, run: &mut RunState) -> Attempt {
        let started = Instant::now();
        let budget_ms = step.timeout_ms.unwrap_or(self.config.default_step_timeout_ms);
        let deadline = started + Duration::from_millis(budget_ms);
        let max_attempts = step.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            run.accumulator.begin_attempt();
            let mut attempt = self.attempt_once(&step, slot, deadline, run).await;
            attempt.started = started;
            attempt.attempts = attempts;

            match &attempt.failure {
                Some(failure) if failure.recoverable && Instant::now() >= deadline => {
                    warn!(
                        step = %step.id,
                        attempt = attempts,
                        budget_ms,
                        reason = %failure.message,
                        "step budget spent"
                    );
                    let message = format!(
                        "step exceeded its {budget_ms}ms budget after {attempts} attempt(s): {}",
                        failure.message
                    );
                    attempt.failure = Some(ClassifiedError::new(ErrorKind::Timeout, message));
                    return attempt;
                }
                Some(failure) if failure.recoverable && attempts < max_attempts => {
                    warn!(
                        step = %step.id,
                        attempt = attempts,
                        kind = %failure.kind,
                        reason = %failure.message,
                        "recoverable failure, retrying step"
                    );
                }
                _ => return attempt,
            }
        }
    }

    async fn attempt_once(
        &self,
        step: &Step,
        slot: usize,
        deadline: Instant,
        run: &mut RunState,
    ) -> Attempt {
        let known = run.accumulator.all_extracted_data();

        let before_snapshot = match self.unless_cancelled(self.surface.snapshot()).await {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(err)) => {
                let error = ActionError::from(err).classify();
                let before = ObservedState::new(SurfaceSnapshot::blank(), known);
                return Attempt::failed_early(step, slot, deadline, before, error);
            }
            None => {
                let before = ObservedState::new(SurfaceSnapshot::blank(), known);
                return Attempt::failed_early(step, slot, deadline, before, cancelled());
            }
        };
        run.accumulator.record_page_state(&before_snapshot);
        let before = ObservedState::new(before_snapshot, known);

        let hints = MemoryHints {
            known_keys: before.extracted_data.keys().cloned().collect(),
            failed_approaches: run.slots[slot].ledger.clone(),
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        let decomposed = self
            .unless_cancelled(tokio::time::timeout(
                remaining,
                self.collaborators
                    .decomposer
                    .decompose(step, &before.snapshot, &hints),
            ))
            .await;
        let actions = match decomposed {
            Some(Ok(Ok(actions))) => actions,
            Some(Ok(Err(err))) => {
                let error = ClassifiedError::classify(err.to_string());
                return Attempt::failed_early(step, slot, deadline, before, error);
            }
            Some(Err(_)) => {
                let error = ClassifiedError::new(
                    ErrorKind::Timeout,
                    format!("decomposition of step {} ran out of step budget", step.id),
                );
                return Attempt::failed_early(step, slot, deadline, before, error);
            }
            None => return Attempt::failed_early(step, slot, deadline, before, cancelled()),
        };
        debug!(step = %step.id, actions = actions.len(), "decomposed step");

        let executed = self
            .unless_cancelled(self.executor.execute_sequence(
                &actions,
                &before.snapshot,
                Some(deadline),
            ))
            .await;
        let Some(outcome) = executed else {
            return Attempt::failed_early(step, slot, deadline, before, cancelled());
        };
        for (key, value) in &outcome.extracted {
            run.accumulator.set_volatile(key.clone(), value.clone());
        }

        let mut failure = outcome.failure.clone();
        let after_snapshot = match self.surface.snapshot().await {
            Ok(snapshot) => {
                run.accumulator.record_page_state(&snapshot);
                snapshot
            }
            Err(err) => {
                if failure.is_none() {
                    failure = Some(ActionError::from(err).classify());
                }
                before.snapshot.clone()
            }
        };

        Attempt {
            step: step.clone(),
            slot,
            started: Instant::now(),
            deadline,
            attempts: 0,
            after: ObservedState::new(after_snapshot, outcome.extracted.clone()),
            before,
            actions: outcome.executed,
            results: outcome.results,
            extracted: outcome.extracted,
            failure,
        }
    }

    async fn evaluate(&self, attempt: Attempt, run: &mut RunState) -> Transition {
        let verdict = match &attempt.failure {
            Some(failure) => Verdict::from_error(failure),
            None => {
                let remaining = attempt.deadline.saturating_duration_since(Instant::now());
                let evaluation = self
                    .unless_cancelled(tokio::time::timeout(
                        remaining,
                        self.collaborators.evaluator.evaluate(
                            &attempt.step,
                            &attempt.before,
                            &attempt.after,
                            &attempt.actions,
                            &attempt.results,
                        ),
                    ))
                    .await;
                match evaluation {
                    Some(Ok(Ok(evaluation))) => judge(&attempt.step, evaluation, &attempt.extracted),
                    Some(Ok(Err(err))) => Verdict::from_error(&ClassifiedError::new(
                        ErrorKind::Unknown,
                        err.to_string(),
                    )),
                    Some(Err(_)) => Verdict::from_error(&ClassifiedError::new(
                        ErrorKind::Timeout,
                        format!("evaluation of step {} ran out of step budget", attempt.step.id),
                    )),
                    None => return Transition::Abort("cancelled".to_string()),
                }
            }
        };

        debug!(
            step = %attempt.step.id,
            success = verdict.success,
            partial = verdict.partial,
            confidence = verdict.confidence,
            "step judged"
        );
        let judged = Box::new(Judged { attempt, verdict });
        if judged.verdict.success {
            return Transition::Advance(judged);
        }

        let reason = judged.verdict.failure_reason();
        run.errors.push(format!("{}: {reason}", judged.attempt.step.id));
        let slot = &run.slots[judged.attempt.slot];
        if slot.replans >= self.config.max_replans_per_step {
            warn!(step = %judged.attempt.step.id, replans = slot.replans, "step replan budget exhausted");
            return self.budget_exhausted(judged, run);
        }
        if run.replans_total >= self.config.max_total_replans {
            let reason = format!(
                "global replan budget of {} exhausted at step {}: {reason}",
                self.config.max_total_replans, judged.attempt.step.id
            );
            return self.abort_step(*judged, run, reason);
        }
        Transition::Replan(judged)
    }

    fn budget_exhausted(&self, judged: Box<Judged>, run: &mut RunState) -> Transition {
        if self.config.enable_degradation {
            return Transition::Degrade(judged);
        }
        let reason = format!(
            "step {} failed after exhausting its replan budget: {}",
            judged.attempt.step.id,
            judged.verdict.failure_reason()
        );
        self.abort_step(*judged, run, reason)
    }

    fn abort_step(&self, judged: Judged, run: &mut RunState, reason: String) -> Transition {
        let step_id = judged.attempt.step.id.clone();
        let slot = judged.attempt.slot;
        run.queue.mark_failed(step_id.clone(), reason.clone());
        run.slots[slot].state = SlotState::Failed;
        run.slots[slot].confidence = 0.0;
        run.step_results.push(step_result(judged, StepStatus::Failure, false));
        warn!(step = %step_id, reason = %reason, "aborting workflow");
        Transition::Abort(reason)
    }

    fn advance(&self, judged: Judged, run: &mut RunState) -> Transition {
        let step = judged.attempt.step.clone();
        let slot = judged.attempt.slot;
        let merged = run.accumulator.commit_volatile();

        let status = if judged.verdict.partial {
            StepStatus::Partial
        } else {
            StepStatus::Success
        };
        run.slots[slot].state = if judged.verdict.partial {
            SlotState::Partial
        } else {
            SlotState::Succeeded
        };
        run.slots[slot].confidence = judged.verdict.confidence;

        run.queue.mark_completed(step.id.clone());
        run.accumulator.create_checkpoint(format!("step-{}", step.id));
        info!(
            step = %step.id,
            status = ?status,
            confidence = judged.verdict.confidence,
            merged,
            "step completed"
        );
        run.step_results.push(step_result(judged, status, false));
        run.completed_steps.push(step);
        Transition::Dispatch
    }

    async fn replan(&self, goal: &Goal, judged: Judged, run: &mut RunState) -> Transition {
        let failed = judged.attempt.step.clone();
        let slot_index = judged.attempt.slot;
        let reason = judged.verdict.failure_reason();

        run.replans_total += 1;
        let slot = &mut run.slots[slot_index];
        slot.replans += 1;
        let entry = ledger_entry(slot.ledger.len() + 1, &failed, &judged.attempt.actions, &reason);
        slot.ledger.push(entry);
        let attempt_number = slot.replans;
        let failed_approaches = slot.ledger.clone();

        let context = ReplanContext {
            goal: goal.clone(),
            failed_step: failed.clone(),
            failure_reason: reason.clone(),
            failure_kind: judged.verdict.error_kind,
            completed_steps: run.completed_steps.clone(),
            accumulated_data: run.accumulator.store().persistent().clone(),
            failed_approaches,
            attempt_number,
            snapshot: judged.attempt.after.snapshot.clone(),
        };
        info!(
            step = %failed.id,
            attempt = attempt_number,
            total = run.replans_total,
            reason = %reason,
            "requesting continuation plan"
        );

        let replanned = self
            .unless_cancelled(self.collaborators.planner.replan(&context))
            .await;
        let continuation = match replanned {
            Some(Ok(plan)) => plan,
            Some(Err(err)) => {
                warn!(step = %failed.id, error = %err, "replanning failed");
                return self.budget_exhausted(Box::new(judged), run);
            }
            None => return Transition::Abort("cancelled".to_string()),
        };
        let validated = match self.validator.validate(continuation, &run.seen_ids) {
            Ok(validated) => validated,
            Err(issue) => {
                warn!(step = %failed.id, issue = %issue, "continuation rejected");
                return self.budget_exhausted(Box::new(judged), run);
            }
        };
        for warning in &validated.warnings {
            warn!(warning = %warning, "continuation adjusted");
        }

        let steps = rename_collisions(validated.plan.steps, &run.seen_ids);
        let removed = run.queue.clear_pending();
        for task in &removed {
            if let Some(slot) = run.slot_of.get(&task.id).copied() {
                run.slots[slot].state = SlotState::Dropped;
            }
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), "continuation replaces pending steps");
        }
        run.queue.mark_failed(failed.id.clone(), reason);

        if let Err(err) = run.enqueue_plan(steps, Some(slot_index)) {
            return Transition::Abort(format!("continuation could not be queued: {err}"));
        }
        Transition::Dispatch
    }

    fn degrade(&self, judged: Judged, run: &mut RunState) -> Transition {
        let step = judged.attempt.step.clone();
        let slot = judged.attempt.slot;
        let reason = judged.verdict.failure_reason();
        let merged = run.accumulator.commit_volatile();

        run.slots[slot].state = SlotState::Partial;
        run.slots[slot].confidence = judged.verdict.confidence;
        run.queue.mark_failed(step.id.clone(), reason.clone());
        run.queue.mark_completed(step.id.clone());
        run.degraded.push(step.id.clone());
        run.accumulator.create_checkpoint(format!("degraded-{}", step.id));
        warn!(step = %step.id, reason = %reason, merged, "step degraded");

        run.step_results.push(step_result(judged, StepStatus::Partial, true));
        Transition::Dispatch
    }

    async fn finish(
        &self,
        goal: Goal,
        run: RunState,
        final_phase: Phase,
        abort_reason: Option<String>,
        started: Instant,
    ) -> WorkflowResult {
        let total = run.live_slots().count();
        let done = run.live_slots().filter(|slot| slot.counts_as_done()).count();
        let completion_percentage = if total == 0 {
            0.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        let confidence_score = if total == 0 {
            0.0
        } else {
            run.live_slots()
                .map(|slot| if slot.counts_as_done() { slot.confidence } else { 0.0 })
                .sum::<f64>()
                / total as f64
        };

        let status = if abort_reason.is_some() {
            WorkflowStatus::Failure
        } else {
            WorkflowStatus::from_completion(done, total)
        };
        let failure_reason = abort_reason.or_else(|| explain(&run, status));
        let extracted_data = run.accumulator.store().persistent().clone();
        let total_duration_ms = started.elapsed().as_millis() as u64;

        let mut errors = run.errors.clone();
        if let Some(reason) = &failure_reason {
            errors.push(reason.clone());
        }

        let summary = match &self.collaborators.summarizer {
            Some(summarizer) => {
                let input = SummaryInput {
                    goal: goal.clone(),
                    status,
                    plan: run.dispatched.clone(),
                    steps: run.step_results.clone(),
                    extracted_data: extracted_data.clone(),
                    duration_ms: total_duration_ms,
                    errors,
                };
                match summarizer.summarize(&input).await {
                    Ok(summary) => Some(summary),
                    Err(err) => {
                        warn!(error = %err, "summary unavailable");
                        None
                    }
                }
            }
            None => None,
        };

        let failed_approaches = run
            .slots
            .iter()
            .filter(|slot| !slot.ledger.is_empty())
            .map(|slot| (slot.opened_by.clone(), slot.ledger.clone()))
            .collect();

        info!(
            workflow = %self.id,
            status = %status,
            completion = completion_percentage,
            replans = run.replans_total,
            duration_ms = total_duration_ms,
            "workflow finished"
        );

        WorkflowResult {
            workflow_id: self.id.clone(),
            goal,
            status,
            completion_percentage,
            extracted_data,
            total_duration_ms,
            confidence_score,
            degraded_step_ids: run.degraded,
            failure_reason,
            unmet_dependencies: run.unmet,
            steps: run.step_results,
            failed_approaches,
            replans_used: run.replans_total,
            checkpoints: run.accumulator.checkpoint_names(),
            final_phase,
            summary,
        }
    }
}

/// Reason for a non-success status reached without an abort.
fn explain(run: &RunState, status: WorkflowStatus) -> Option<String> {
    if status == WorkflowStatus::Success && run.degraded.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    if !run.degraded.is_empty() {
        let ids: Vec<&str> = run.degraded.iter().map(StepId::as_str).collect();
        parts.push(format!("degraded after exhausting replans: {}", ids.join(", ")));
    }
    let unfinished = run
        .live_slots()
        .filter(|slot| !slot.counts_as_done())
        .count();
    if unfinished > 0 {
        parts.push(format!("{unfinished} step(s) did not finish"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn cancelled() -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Unknown, "cancelled")
}

fn step_result(judged: Judged, status: StepStatus, degraded: bool) -> StepResult {
    let Judged { attempt, verdict } = judged;
    let success = status != StepStatus::Failure && !degraded;
    let error_reason = if success { None } else { Some(verdict.failure_reason()) };
    StepResult {
        step_id: attempt.step.id.clone(),
        description: attempt.step.description.clone(),
        status,
        success,
        actions: attempt.actions,
        action_results: attempt.results,
        evidence: EvidenceBundle {
            extracted_data: attempt.extracted,
            before: attempt.before,
            after: attempt.after,
            evaluator: verdict.evidence,
        },
        error_reason,
        error_kind: if success { None } else { verdict.error_kind },
        duration_ms: attempt.started.elapsed().as_millis() as u64,
        attempts: attempt.attempts,
        confidence: verdict.confidence,
        degraded,
        matched_alternative: verdict.matched_alternative,
    }
}

impl Attempt {
    fn failed_early(
        step: &Step,
        slot: usize,
        deadline: Instant,
        before: ObservedState,
        error: ClassifiedError,
    ) -> Self {
        let after = ObservedState::new(before.snapshot.clone(), ExtractedData::new());
        Self {
            step: step.clone(),
            slot,
            started: Instant::now(),
            deadline,
            attempts: 0,
            before,
            after,
            actions: Vec::new(),
            results: Vec::new(),
            extracted: ExtractedData::new(),
            failure: Some(error),
        }
    }
}
