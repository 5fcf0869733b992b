//! Read-only extraction primitives

use stepwise_core_types::SurfaceSnapshot;
use tracing::debug;

use super::{resolve_point, MicroActionExecutor};
use crate::{errors::ActionError, types::Extraction};

fn require_key(key: &str) -> Result<(), ActionError> {
    if key.trim().is_empty() {
        return Err(ActionError::InvalidAction(
            "extraction key must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(super) async fn extract_text(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    key: &str,
) -> Result<Extraction, ActionError> {
    require_key(key)?;
    let point = resolve_point(snapshot, element, "extract")?;
    let text = executor.driver().read_text_at(point).await?;
    let extraction = Extraction::from_option(text);
    debug!(key, found = matches!(extraction, Extraction::Found(_)), "extract text");
    Ok(extraction)
}

pub(super) async fn extract_href(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    key: &str,
) -> Result<Extraction, ActionError> {
    require_key(key)?;
    let point = resolve_point(snapshot, element, "extract_href")?;
    let href = executor.driver().read_attribute_at(point, "href").await?;
    Ok(Extraction::from_option(href))
}

pub(super) async fn extract_url(
    executor: &MicroActionExecutor,
    key: &str,
) -> Result<Extraction, ActionError> {
    require_key(key)?;
    let url = executor.driver().current_url().await?;
    Ok(Extraction::from_option(Some(url)))
}
