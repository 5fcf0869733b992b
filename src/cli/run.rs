use std::path::PathBuf;
use std::process::ExitCode;

use action_primitives::MicroActionExecutor;
use agent_core::WorkflowOrchestrator;
use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::output::{render_result, OutputFormat};
use crate::config::AppConfig;
use crate::scenario::Scenario;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Scenario file to execute
    #[arg(short, long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Replans allowed per step before degrading or aborting
    #[arg(long, value_name = "N")]
    pub max_replans_per_step: Option<u32>,

    /// Replans allowed across the whole run
    #[arg(long, value_name = "N")]
    pub max_total_replans: Option<u32>,

    /// Abort instead of degrading a step that exhausts its replans
    #[arg(long)]
    pub no_degrade: bool,

    /// Mirror checkpoints into this directory
    #[arg(long, value_name = "DIR")]
    pub checkpoint_dir: Option<PathBuf>,
}

/// Exit status: 0 for success, partial and degraded runs; 1 for failed runs.
pub async fn cmd_run(args: RunArgs, config: &AppConfig, output: OutputFormat) -> Result<ExitCode> {
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;

    let mut workflow = config.effective_workflow();
    if let Some(replans) = args.max_replans_per_step {
        workflow = workflow.max_replans_per_step(replans);
    }
    if let Some(replans) = args.max_total_replans {
        workflow = workflow.max_total_replans(replans);
    }
    if args.no_degrade {
        workflow = workflow.degradation(false);
    }
    if let Some(dir) = args.checkpoint_dir {
        workflow = workflow.checkpoint_dir(dir);
    }

    let surface = scenario.surface()?;
    let executor = MicroActionExecutor::new(surface.clone(), config.executor.clone());
    let cancel = CancellationToken::new();
    let orchestrator =
        WorkflowOrchestrator::new(workflow, scenario.collaborators(), surface, executor)
            .with_cancellation(cancel.clone());
    info!(workflow = %orchestrator.id(), scenario = %args.scenario.display(), "running scenario");

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, cancelling workflow (press Ctrl-C again to exit)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
    });
    let result = orchestrator.run(scenario.goal.clone()).await;
    interrupt.abort();

    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result).context("Failed to encode result")?;
            println!("{json}");
        }
        OutputFormat::Text => println!("{}", render_result(&result)),
    }

    if result.status.is_failure() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
