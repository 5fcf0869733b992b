//! Settle waiting between micro-actions

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::types::ActionKind;

/// Strategy applied after a state-mutating action before the next one starts.
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    async fn settle(&self, after: &ActionKind, delay: Duration);
}

/// Fixed-delay settling.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultWaitStrategy;

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn settle(&self, after: &ActionKind, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        debug!(action = after.name(), delay_ms = delay.as_millis() as u64, "settling");
        tokio::time::sleep(delay).await;
    }
}
