//! Task queue for strategic workflow steps.
//!
//! Two lanes feed one dispatcher: a fast-track lane (FIFO) that is always scanned
//! first, and a normal lane kept ordered by priority, dependency count and insertion
//! order. Only tasks whose dependencies are all completed are ever yielded.

pub mod error;
pub mod lane;
pub mod model;
pub mod queue;

pub use error::SchedulerError;
pub use model::{QueueStats, QueuedTask};
pub use queue::TaskQueue;
