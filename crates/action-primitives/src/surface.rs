//! Capability ports onto the concrete surface driver.
//!
//! The engine never sees driver-specific handles: element indices are resolved to
//! coordinates from the snapshot before a driver call is made.

use async_trait::async_trait;
use stepwise_core_types::{Point, SurfaceSnapshot};
use thiserror::Error;

/// Failures reported by a surface driver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("option not found: {0}")]
    OptionNotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("driver i/o: {0}")]
    Io(String),
}

/// Primitive operations offered by a browser (or any interactive surface).
#[async_trait]
pub trait SurfaceDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn click_at(&self, point: Point) -> Result<(), DriverError>;

    async fn fill_at(&self, point: Point, text: &str) -> Result<(), DriverError>;

    async fn clear_at(&self, point: Point) -> Result<(), DriverError>;

    async fn hover_at(&self, point: Point) -> Result<(), DriverError>;

    async fn select_at(&self, point: Point, option: &str) -> Result<(), DriverError>;

    async fn drag(&self, from: Point, to: Point) -> Result<(), DriverError>;

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), DriverError>;

    /// Single non-blocking probe; callers poll with their own deadline.
    async fn element_present(&self, query: &str) -> Result<bool, DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn current_title(&self) -> Result<Option<String>, DriverError>;

    async fn read_text_at(&self, point: Point) -> Result<Option<String>, DriverError>;

    async fn read_attribute_at(
        &self,
        point: Point,
        name: &str,
    ) -> Result<Option<String>, DriverError>;
}

/// Produces indexed snapshots of the current surface.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> Result<SurfaceSnapshot, DriverError>;
}
