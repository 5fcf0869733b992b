//! Navigation and scrolling

use tracing::{debug, info};

use super::MicroActionExecutor;
use crate::{
    errors::ActionError,
    types::{ScrollDirection, DEFAULT_SCROLL_AMOUNT},
};

pub(super) async fn navigate(executor: &MicroActionExecutor, url: &str) -> Result<(), ActionError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ActionError::InvalidAction(
            "navigate requires a url".to_string(),
        ));
    }
    info!(url, "navigating");
    executor.driver().navigate(url).await?;
    Ok(())
}

pub(super) async fn scroll(
    executor: &MicroActionExecutor,
    direction: ScrollDirection,
    amount: Option<i32>,
) -> Result<(), ActionError> {
    let amount = amount.unwrap_or(DEFAULT_SCROLL_AMOUNT).abs();
    let (dx, dy) = match direction {
        ScrollDirection::Up => (0, -amount),
        ScrollDirection::Down => (0, amount),
        ScrollDirection::Left => (-amount, 0),
        ScrollDirection::Right => (amount, 0),
    };
    debug!(dx, dy, "scroll");
    executor.driver().scroll(dx, dy).await?;
    Ok(())
}
