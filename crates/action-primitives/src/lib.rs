//! Micro-action layer - atomic surface operations
//!
//! This crate provides the execution contract for the smallest unit of work:
//! - 13 action types: click, fill, clear, hover, select, drag, scroll, wait,
//!   wait_for_element, extract, extract_url, extract_href, navigate
//! - Element resolution against an indexed surface snapshot
//! - Settle delays after state-mutating actions
//! - Structured results that never surface as errors to the caller
//! - A scripted in-memory surface for tests and offline runs

pub mod errors;
pub mod fixture;
mod primitives;
pub mod surface;
pub mod types;
mod waiting;

pub use errors::*;
pub use fixture::{FixtureElement, FixturePage, ScriptedSurface, SurfaceFixture};
pub use primitives::*;
pub use surface::{DriverError, SnapshotProvider, SurfaceDriver};
pub use types::*;
pub use waiting::*;
