use async_trait::async_trait;

use crate::errors::AgentError;
use crate::ports::Summarizer;
use crate::workflow::{StepStatus, SummaryInput};

/// Plain-text run report.
#[derive(Debug, Clone, Default)]
pub struct TemplateSummarizer;

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> Result<String, AgentError> {
        let mut lines = vec![
            format!("Goal: {}", input.goal),
            format!(
                "Status: {} after {} step(s) in {}ms",
                input.status,
                input.steps.len(),
                input.duration_ms
            ),
        ];
        for step in &input.steps {
            let marker = match (step.status, step.degraded) {
                (_, true) => "degraded",
                (StepStatus::Success, _) => "ok",
                (StepStatus::Partial, _) => "partial",
                (StepStatus::Failure, _) => "failed",
            };
            lines.push(format!("  [{marker}] {} - {}", step.step_id, step.description));
        }
        if !input.extracted_data.is_empty() {
            lines.push("Data:".to_string());
            for (key, value) in &input.extracted_data {
                lines.push(format!("  {key} = {value}"));
            }
        }
        if !input.errors.is_empty() {
            lines.push(format!("Errors: {}", input.errors.len()));
        }
        Ok(lines.join("\n"))
    }
}
