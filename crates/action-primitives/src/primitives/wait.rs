//! Bounded waits

use std::time::Instant;

use tokio::time::sleep;
use tracing::debug;

use super::MicroActionExecutor;
use crate::errors::ActionError;

/// Sleep for `ms`, clamped to the configured ceiling.
pub(super) async fn wait_fixed(executor: &MicroActionExecutor, ms: u64) {
    let delay = executor.config().clamp_wait(ms);
    debug!(requested_ms = ms, effective_ms = delay.as_millis() as u64, "wait");
    sleep(delay).await;
}

/// Poll the driver until `query` is present or the wait times out.
pub(super) async fn wait_for_element(
    executor: &MicroActionExecutor,
    query: &str,
    timeout_ms: Option<u64>,
) -> Result<(), ActionError> {
    if query.trim().is_empty() {
        return Err(ActionError::InvalidAction(
            "wait_for_element requires a query".to_string(),
        ));
    }

    let config = executor.config();
    let timeout = config.clamp_wait(timeout_ms.unwrap_or(config.default_wait_timeout_ms));
    let poll = config.clamp_wait(config.poll_interval_ms.max(1));
    let started = Instant::now();

    loop {
        if executor.driver().element_present(query).await? {
            debug!(query, elapsed_ms = started.elapsed().as_millis() as u64, "element appeared");
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(ActionError::Timeout(format!(
                "element '{}' did not appear within {}ms",
                query,
                timeout.as_millis()
            )));
        }
        sleep(poll).await;
    }
}
