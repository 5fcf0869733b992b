//! Element-targeted primitives: click, fill, clear, hover, select, drag

use stepwise_core_types::SurfaceSnapshot;
use tracing::debug;

use super::{resolve_point, MicroActionExecutor};
use crate::errors::ActionError;

pub(super) async fn click(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
) -> Result<(), ActionError> {
    let point = resolve_point(snapshot, element, "click")?;
    debug!(?element, x = point.x, y = point.y, "click");
    executor.driver().click_at(point).await?;
    Ok(())
}

pub(super) async fn fill(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    value: &str,
) -> Result<(), ActionError> {
    let point = resolve_point(snapshot, element, "fill")?;
    debug!(?element, chars = value.chars().count(), "fill");
    executor.driver().fill_at(point, value).await?;
    Ok(())
}

pub(super) async fn clear(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
) -> Result<(), ActionError> {
    let point = resolve_point(snapshot, element, "clear")?;
    executor.driver().clear_at(point).await?;
    Ok(())
}

pub(super) async fn hover(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
) -> Result<(), ActionError> {
    let point = resolve_point(snapshot, element, "hover")?;
    executor.driver().hover_at(point).await?;
    Ok(())
}

pub(super) async fn select(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    option: &str,
) -> Result<(), ActionError> {
    let point = resolve_point(snapshot, element, "select")?;
    if option.trim().is_empty() {
        return Err(ActionError::InvalidAction(
            "select requires a non-empty option".to_string(),
        ));
    }
    debug!(?element, option, "select");
    executor.driver().select_at(point, option).await?;
    Ok(())
}

pub(super) async fn drag(
    executor: &MicroActionExecutor,
    snapshot: &SurfaceSnapshot,
    element: Option<u32>,
    target: Option<u32>,
) -> Result<(), ActionError> {
    let from = resolve_point(snapshot, element, "drag")?;
    let to = resolve_point(snapshot, target, "drag target")?;
    debug!(?element, ?target, "drag");
    executor.driver().drag(from, to).await?;
    Ok(())
}
