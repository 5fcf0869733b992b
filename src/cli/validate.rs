use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::output::OutputFormat;
use crate::config::AppConfig;
use crate::scenario::Scenario;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Scenario file to check
    #[arg(short, long, value_name = "FILE")]
    pub scenario: PathBuf,
}

pub fn cmd_validate(args: ValidateArgs, config: &AppConfig, output: OutputFormat) -> Result<ExitCode> {
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;
    let issues = scenario.validate(config.workflow.max_plan_steps);
    let valid = !issues.iter().any(|issue| issue.is_fatal());

    match output {
        OutputFormat::Json => {
            let issues: Vec<_> = issues
                .iter()
                .map(|issue| {
                    json!({
                        "location": issue.location,
                        "issue": issue.issue.to_string(),
                        "fatal": issue.is_fatal(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "valid": valid, "issues": issues }))?
            );
        }
        OutputFormat::Text => {
            for issue in &issues {
                let level = if issue.is_fatal() { "error" } else { "warning" };
                println!("{level}: {issue}");
            }
            if valid {
                println!(
                    "Scenario OK: {} step(s), {} continuation(s)",
                    scenario.plan.len(),
                    scenario.continuations.len()
                );
            }
        }
    }

    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
