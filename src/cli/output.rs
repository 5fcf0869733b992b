use std::time::Duration;

use agent_core::{StepStatus, WorkflowResult};
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Human-readable report of a finished workflow.
pub fn render_result(result: &WorkflowResult) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "Workflow {} finished: {} ({:.0}% complete, confidence {:.2})",
        result.workflow_id, result.status, result.completion_percentage, result.confidence_score
    ));
    out.push(format!("Goal: {}", result.goal));
    out.push(format!(
        "Duration: {}  Replans: {}",
        humantime::format_duration(Duration::from_millis(result.total_duration_ms)),
        result.replans_used
    ));

    if !result.steps.is_empty() {
        out.push("Steps:".to_string());
        for step in &result.steps {
            let marker = match (step.status, step.degraded) {
                (_, true) => "degraded",
                (StepStatus::Success, _) => "ok",
                (StepStatus::Partial, _) => "partial",
                (StepStatus::Failure, _) => "failed",
            };
            let mut line = format!(
                "  [{marker}] {} - {} ({} attempt(s), {})",
                step.step_id,
                step.description,
                step.attempts,
                humantime::format_duration(Duration::from_millis(step.duration_ms))
            );
            if let Some(reason) = &step.error_reason {
                line.push_str(&format!(": {reason}"));
            }
            out.push(line);
        }
    }

    if !result.extracted_data.is_empty() {
        out.push("Data:".to_string());
        for (key, value) in &result.extracted_data {
            out.push(format!("  {key} = {value}"));
        }
    }
    if let Some(reason) = &result.failure_reason {
        out.push(format!("Reason: {reason}"));
    }
    for (step, unmet) in &result.unmet_dependencies {
        let unmet: Vec<&str> = unmet.iter().map(|id| id.as_str()).collect();
        out.push(format!("Blocked: {step} waits on {}", unmet.join(", ")));
    }
    if let Some(summary) = &result.summary {
        out.push("Summary:".to_string());
        out.extend(summary.lines().map(|line| format!("  {line}")));
    }
    out.join("\n")
}
