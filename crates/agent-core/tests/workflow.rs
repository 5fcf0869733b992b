use std::sync::Arc;
use std::time::Duration;

use action_primitives::{
    ActionResult, ExecutorConfig, FixtureElement, FixturePage, MicroAction, MicroActionExecutor, ScriptedSurface,
    SurfaceFixture,
};
use agent_core::stubs::{RuleBasedDecomposer, RuleBasedEvaluator, ScriptedPlanner, TemplateSummarizer};
use agent_core::{
    AgentError, Collaborators, Decomposer, Evaluation, Evaluator, MemoryHints, ObservedState, Phase,
    Plan, Step, StepIntent, StepStatus, Summarizer, SummaryInput, WorkflowConfig,
    WorkflowOrchestrator, WorkflowStatus,
};
use async_trait::async_trait;
use stepwise_core_types::{ErrorKind, StepId, SurfaceSnapshot};
use tokio_util::sync::CancellationToken;

fn shop() -> Arc<ScriptedSurface> {
    let fixture = SurfaceFixture {
        start: "https://shop.test".into(),
        pages: vec![
            FixturePage::new("https://shop.test", "Shop")
                .with_element(FixtureElement::new("input").with_attribute("placeholder", "Search products"))
                .with_element(
                    FixtureElement::new("button")
                        .with_text("Search")
                        .with_href("https://shop.test/results"),
                )
                .with_element(
                    FixtureElement::new("a")
                        .with_text("Deals")
                        .with_href("https://shop.test/deals"),
                )
                .with_element(FixtureElement::new("div")),
            FixturePage::new("https://shop.test/results", "Results")
                .with_element(FixtureElement::new("span").with_text("12 results for laptop"))
                .with_element(
                    FixtureElement::new("span")
                        .with_text("$999")
                        .with_attribute("data-field", "price"),
                )
                .with_element(
                    FixtureElement::new("a")
                        .with_text("ThinkPad X1")
                        .with_href("https://shop.test/item"),
                ),
            FixturePage::new("https://shop.test/deals", "Deals")
                .with_element(FixtureElement::new("span").with_text("No deals today"))
                .with_element(FixtureElement::new("a").with_text("Home").with_href("https://shop.test")),
            FixturePage::new("https://shop.test/item", "ThinkPad X1")
                .with_element(
                    FixtureElement::new("span")
                        .with_text("ThinkPad X1 Carbon")
                        .with_attribute("data-field", "name"),
                ),
        ],
    };
    Arc::new(ScriptedSurface::new(fixture).unwrap())
}

fn search_step() -> Step {
    Step::new("search", "Search for laptops")
        .with_intent(StepIntent::Search)
        .with_target("laptop")
        .expecting("results for laptop")
}

fn extract_price() -> Step {
    Step::new("extract", "Read the price")
        .with_intent(StepIntent::Extract)
        .requiring("price")
}

fn checkout_step() -> Step {
    Step::new("checkout", "Place the order")
        .with_target("Checkout")
        .expecting("Order placed")
}

fn config() -> WorkflowConfig {
    WorkflowConfig::default().step_timeout(5_000)
}

struct Run {
    surface: Arc<ScriptedSurface>,
    planner: Arc<ScriptedPlanner>,
    decomposer: Arc<dyn Decomposer>,
    evaluator: Arc<dyn Evaluator>,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: WorkflowConfig,
}

impl Run {
    fn new(planner: ScriptedPlanner) -> Self {
        Self {
            surface: shop(),
            planner: Arc::new(planner),
            decomposer: Arc::new(RuleBasedDecomposer::new()),
            evaluator: Arc::new(RuleBasedEvaluator::new()),
            summarizer: Some(Arc::new(TemplateSummarizer)),
            config: config(),
        }
    }

    fn decomposer(mut self, decomposer: impl Decomposer + 'static) -> Self {
        self.decomposer = Arc::new(decomposer);
        self
    }

    fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    fn orchestrator(&self) -> WorkflowOrchestrator {
        let collaborators = Collaborators {
            planner: self.planner.clone(),
            decomposer: self.decomposer.clone(),
            evaluator: self.evaluator.clone(),
            summarizer: self.summarizer.clone(),
        };
        let executor = MicroActionExecutor::new(self.surface.clone(), ExecutorConfig::immediate());
        WorkflowOrchestrator::new(self.config.clone(), collaborators, self.surface.clone(), executor)
    }
}

#[tokio::test]
async fn plan_runs_to_success_and_collects_data() {
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step(), extract_price()])));

    let result = run.orchestrator().run("find the price of a laptop").await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(result.completion_percentage, 100.0);
    assert_eq!(result.final_phase, Phase::Completed);
    assert_eq!(result.extracted_data.get("price").map(String::as_str), Some("$999"));
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps.iter().all(|step| step.success));
    assert_eq!(result.checkpoints, vec!["step-search", "step-extract"]);
    assert!((result.confidence_score - 0.875).abs() < 1e-9);
    assert!(result.failure_reason.is_none());
    assert_eq!(result.replans_used, 0);
    assert!(result.summary.unwrap().contains("price = $999"));
    assert_eq!(
        run.surface.action_log(),
        vec!["fill#0".to_string(), "click#1".to_string()]
    );
}

#[tokio::test]
async fn failing_step_gets_exactly_three_replans_then_degrades() {
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), checkout_step()]))
        .retrying_failed_step(true);
    let run = Run::new(planner);

    let result = run.orchestrator().run("buy a laptop").await;

    assert_eq!(run.planner.replan_count(), 3);
    assert_eq!(result.replans_used, 3);
    assert_eq!(result.degraded_step_ids, vec![StepId::new("checkout-r3")]);
    let degraded = result.step(&StepId::new("checkout-r3")).unwrap();
    assert!(degraded.degraded);
    assert_eq!(degraded.status, StepStatus::Partial);
    assert_eq!(degraded.attempts, 2);
    assert!(result.failure_reason.unwrap().contains("checkout-r3"));
    assert!(result.checkpoints.contains(&"degraded-checkout-r3".to_string()));

    let contexts = run.planner.replan_requests();
    let attempts: Vec<u32> = contexts.iter().map(|context| context.attempt_number).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    let ledger = &result.failed_approaches[&StepId::new("checkout")];
    assert_eq!(ledger.len(), 3);
    assert!(ledger[0].starts_with("attempt 1: Place the order via [] failed: "));
}

#[tokio::test]
async fn exhausted_step_aborts_without_degradation() {
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), checkout_step()]))
        .retrying_failed_step(true);
    let run = Run::new(planner).config(config().degradation(false));

    let result = run.orchestrator().run("buy a laptop").await;

    assert_eq!(run.planner.replan_count(), 3);
    assert_eq!(result.status, WorkflowStatus::Failure);
    assert_eq!(result.final_phase, Phase::Aborted);
    assert_eq!(result.completion_percentage, 50.0);
    assert!(result.degraded_step_ids.is_empty());
    assert!(result
        .failure_reason
        .unwrap()
        .contains("after exhausting its replan budget"));
}

#[tokio::test]
async fn failed_approaches_only_grow_across_replans() {
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), checkout_step()]))
        .retrying_failed_step(true);
    let run = Run::new(planner);

    run.orchestrator().run("buy a laptop").await;

    let contexts = run.planner.replan_requests();
    for pair in contexts.windows(2) {
        let (earlier, later) = (&pair[0].failed_approaches, &pair[1].failed_approaches);
        assert!(later.len() > earlier.len());
        assert_eq!(&later[..earlier.len()], &earlier[..]);
    }
}

#[tokio::test]
async fn global_budget_exhaustion_is_fatal() {
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), checkout_step()]))
        .retrying_failed_step(true);
    let run = Run::new(planner).config(config().max_total_replans(2));

    let result = run.orchestrator().run("buy a laptop").await;

    assert_eq!(run.planner.replan_count(), 2);
    assert_eq!(result.replans_used, 2);
    assert_eq!(result.status, WorkflowStatus::Failure);
    assert!(result.failure_reason.unwrap().contains("global replan budget"));
}

#[tokio::test]
async fn data_survives_replanning_and_failed_attempts_do_not_leak() {
    let open_item = Step::new("open-item", "Open the first laptop")
        .with_target("ThinkPad X1")
        .expecting("Warranty");
    let read_name = Step::new("read-name", "Read the product name")
        .with_intent(StepIntent::Extract)
        .requiring("name")
        .independent();
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), extract_price(), open_item]))
        .with_continuation(Plan::new(vec![read_name]));
    let decomposer = RuleBasedDecomposer::new().with_actions(
        "open-item",
        vec![MicroAction::extract(0, "draft_note"), MicroAction::click(2)],
    );
    let run = Run::new(planner).decomposer(decomposer);

    let result = run.orchestrator().run("look up a laptop").await;

    let context = &run.planner.replan_requests()[0];
    assert_eq!(context.accumulated_data.get("price").map(String::as_str), Some("$999"));
    assert!(!context.accumulated_data.contains_key("draft_note"));
    assert_eq!(context.completed_steps.len(), 2);

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(result.extracted_data.get("price").map(String::as_str), Some("$999"));
    assert_eq!(
        result.extracted_data.get("name").map(String::as_str),
        Some("ThinkPad X1 Carbon")
    );
    assert!(!result.extracted_data.contains_key("draft_note"));
    assert_eq!(
        result.checkpoints,
        vec!["step-search", "step-extract", "step-read-name"]
    );
}

#[tokio::test]
async fn listed_alternative_is_accepted_as_partial() {
    let deals = Step::new("deals", "Open discounted laptops")
        .with_intent(StepIntent::Filter)
        .with_target("Deals")
        .expecting("discounted laptops")
        .with_alternative("No deals today")
        .allow_partial(true);
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![deals])));

    let result = run.orchestrator().run("find laptop deals").await;

    let step = result.step(&StepId::new("deals")).unwrap();
    assert_eq!(step.status, StepStatus::Partial);
    assert!(step.success);
    assert_eq!(step.matched_alternative.as_deref(), Some("No deals today"));
    assert_eq!(step.confidence, 0.7);
    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(run.planner.replan_count(), 0);
}

#[tokio::test]
async fn alternative_without_partial_permission_is_a_failure() {
    let deals = Step::new("deals", "Open discounted laptops")
        .with_intent(StepIntent::Filter)
        .with_target("Deals")
        .expecting("discounted laptops")
        .with_alternative("No deals today");
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![deals])));

    let result = run.orchestrator().run("find laptop deals").await;

    assert_eq!(run.planner.replan_count(), 1);
    assert_eq!(result.degraded_step_ids, vec![StepId::new("deals")]);
    let step = result.step(&StepId::new("deals")).unwrap();
    assert!(step.matched_alternative.is_none());
    assert!(!step.success);
}

#[tokio::test]
async fn extraction_without_data_fails_despite_confident_evaluator() {
    let grab = Step::new("grab", "Read the price").with_intent(StepIntent::Extract).requiring("price");
    let decomposer = RuleBasedDecomposer::new().with_actions("grab", vec![MicroAction::extract(3, "price")]);
    let evaluator = RuleBasedEvaluator::new().with_evaluation("grab", Evaluation::success(1.0));
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![grab])))
        .decomposer(decomposer)
        .evaluator(evaluator)
        .config(config().degradation(false));

    let result = run.orchestrator().run("read a price").await;

    assert_eq!(result.status, WorkflowStatus::Failure);
    assert!(result.extracted_data.is_empty());
    let step = result.step(&StepId::new("grab")).unwrap();
    assert_eq!(step.status, StepStatus::Failure);
    assert_eq!(
        step.error_reason.as_deref(),
        Some("extraction produced no meaningful data")
    );
}

#[tokio::test]
async fn continuation_waiting_on_failed_step_reports_unmet_dependencies() {
    let pick = Step::new("pick", "Open the first laptop")
        .with_target("ThinkPad X1")
        .expecting("ThinkPad X1 Carbon");
    let after = Step::new("after", "Continue after the pick")
        .with_target("Home")
        .depends_on(["pick"]);
    let planner = ScriptedPlanner::new(Plan::new(vec![search_step(), pick]))
        .with_continuation(Plan::new(vec![after]));
    let evaluator = RuleBasedEvaluator::new().with_evaluation("pick", Evaluation::failure("wrong item"));
    let run = Run::new(planner).evaluator(evaluator);

    let result = run.orchestrator().run("open a laptop").await;

    assert_eq!(result.status, WorkflowStatus::Failure);
    assert_eq!(
        result.unmet_dependencies.get(&StepId::new("after")),
        Some(&vec![StepId::new("pick")])
    );
    assert!(result.failure_reason.unwrap().contains("after waits on [pick]"));
}

#[tokio::test]
async fn recoverable_failure_retries_the_step_before_replanning() {
    let deals = Step::new("deals", "Open deals")
        .with_target("Deals")
        .expecting("No deals today");
    let decomposer = RuleBasedDecomposer::new().with_actions("deals", vec![MicroAction::click(42)]);
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![deals]))).decomposer(decomposer);

    let result = run.orchestrator().run("open deals").await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(run.planner.replan_count(), 0);
    let step = result.step(&StepId::new("deals")).unwrap();
    assert_eq!(step.attempts, 2);
    assert_eq!(step.actions, vec![MicroAction::click(2)]);
}

#[tokio::test]
async fn colliding_continuation_id_is_renamed() {
    let pick = Step::new("pick", "Open deals")
        .with_target("Deals")
        .expecting("No deals today");
    let retry = Step::new("pick", "Go back home")
        .with_target("Home")
        .expecting("Search products")
        .independent();
    let planner =
        ScriptedPlanner::new(Plan::new(vec![pick])).with_continuation(Plan::new(vec![retry]));
    let evaluator = RuleBasedEvaluator::new().with_evaluation("pick", Evaluation::failure("not yet"));
    let run = Run::new(planner).evaluator(evaluator);

    let result = run.orchestrator().run("browse").await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(result.steps.len(), 1);
    assert!(result.step(&StepId::new("pick-r1")).unwrap().success);
    assert_eq!(result.failed_approaches[&StepId::new("pick")].len(), 1);
}

/// Cancels the run the moment a given step is decomposed.
struct CancellingDecomposer {
    inner: RuleBasedDecomposer,
    token: CancellationToken,
    at: StepId,
}

#[async_trait]
impl Decomposer for CancellingDecomposer {
    async fn decompose(
        &self,
        step: &Step,
        snapshot: &SurfaceSnapshot,
        hints: &MemoryHints,
    ) -> Result<Vec<MicroAction>, AgentError> {
        if step.id == self.at {
            self.token.cancel();
        }
        self.inner.decompose(step, snapshot, hints).await
    }
}

#[tokio::test]
async fn cancellation_aborts_at_next_transition() {
    let token = CancellationToken::new();
    let decomposer = CancellingDecomposer {
        inner: RuleBasedDecomposer::new(),
        token: token.clone(),
        at: StepId::new("extract"),
    };
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step(), extract_price()])))
        .decomposer(decomposer);

    let result = run
        .orchestrator()
        .with_cancellation(token)
        .run("find the price of a laptop")
        .await;

    assert_eq!(result.status, WorkflowStatus::Failure);
    assert_eq!(result.final_phase, Phase::Aborted);
    assert_eq!(result.failure_reason.as_deref(), Some("cancelled"));
    assert_eq!(result.steps.len(), 1);
    assert!(result.extracted_data.is_empty());
}

#[tokio::test]
async fn cancelled_before_start_yields_one_failed_result() {
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step()])));
    let orchestrator = run.orchestrator();
    orchestrator.cancellation_token().cancel();

    let result = orchestrator.run("anything").await;

    assert_eq!(result.status, WorkflowStatus::Failure);
    assert_eq!(result.completion_percentage, 0.0);
    assert!(result.steps.is_empty());
}

struct BrokenSummarizer;

#[async_trait]
impl Summarizer for BrokenSummarizer {
    async fn summarize(&self, _input: &SummaryInput) -> Result<String, AgentError> {
        Err(AgentError::summary("model unavailable"))
    }
}

#[tokio::test]
async fn summarizer_failure_only_omits_the_summary() {
    let mut run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step(), extract_price()])));
    run.summarizer = Some(Arc::new(BrokenSummarizer));

    let result = run.orchestrator().run("find the price of a laptop").await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert!(result.summary.is_none());
}

#[tokio::test]
async fn checkpoints_are_mirrored_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step(), extract_price()])))
        .config(config().checkpoint_dir(dir.path()));

    let result = run.orchestrator().run("find the price of a laptop").await;

    let stored =
        stepwise_state_center::load_checkpoints(dir.path(), &result.workflow_id.to_string()).unwrap();
    let names: Vec<&str> = stored.iter().map(|checkpoint| checkpoint.name.as_str()).collect();
    assert_eq!(names, vec!["step-search", "step-extract"]);
    assert_eq!(
        stored[1].data.get("price").map(String::as_str),
        Some("$999")
    );
}

/// Takes `delay` to decompose every step into a click on a missing element.
struct SlowDecomposer {
    delay: Duration,
}

#[async_trait]
impl Decomposer for SlowDecomposer {
    async fn decompose(
        &self,
        _step: &Step,
        _snapshot: &SurfaceSnapshot,
        _hints: &MemoryHints,
    ) -> Result<Vec<MicroAction>, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![MicroAction::click(42)])
    }
}

#[tokio::test]
async fn retries_share_one_step_budget() {
    let slow = Step::new("slow", "Open something slowly")
        .with_timeout(300)
        .with_max_attempts(4);
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![slow])))
        .decomposer(SlowDecomposer { delay: Duration::from_millis(200) });

    let result = run.orchestrator().run("open it").await;

    let step = result.step(&StepId::new("slow")).unwrap();
    assert_eq!(step.attempts, 2);
    assert_eq!(step.error_kind, Some(ErrorKind::Timeout));
    assert!(step.error_reason.as_deref().unwrap().contains("300ms budget"));
    assert!(step.duration_ms < 600, "took {}ms", step.duration_ms);
}

/// Never answers.
struct HungEvaluator;

#[async_trait]
impl Evaluator for HungEvaluator {
    async fn evaluate(
        &self,
        _step: &Step,
        _before: &ObservedState,
        _after: &ObservedState,
        _actions: &[MicroAction],
        _results: &[ActionResult],
    ) -> Result<Evaluation, AgentError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn cancellation_interrupts_a_hung_evaluator() {
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search_step()])))
        .evaluator(HungEvaluator)
        .config(WorkflowConfig::default().step_timeout(60_000));
    let orchestrator = run.orchestrator();
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(3), orchestrator.run("search"))
        .await
        .expect("run ends once cancelled");

    assert_eq!(result.status, WorkflowStatus::Failure);
    assert_eq!(result.final_phase, Phase::Aborted);
    assert_eq!(result.failure_reason.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn hung_evaluator_times_out_within_step_budget() {
    let search = search_step().with_timeout(200).with_max_attempts(1);
    let run = Run::new(ScriptedPlanner::new(Plan::new(vec![search]))).evaluator(HungEvaluator);

    let result = tokio::time::timeout(Duration::from_secs(3), run.orchestrator().run("search"))
        .await
        .expect("evaluation is bounded by the step budget");

    let step = result.step(&StepId::new("search")).unwrap();
    assert!(!step.success);
    assert_eq!(step.error_kind, Some(ErrorKind::Timeout));
    assert!(step.error_reason.as_deref().unwrap().contains("ran out of step budget"));
}
