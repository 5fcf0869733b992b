//! Stepwise CLI library
//!
//! Configuration, scenario loading and the command implementations behind the
//! `stepwise` binary.

pub mod cli;
pub mod config;
pub mod errors;
pub mod scenario;

pub use config::{AppConfig, LoggingConfig};
pub use errors::StepwiseError;
pub use scenario::{Scenario, ScenarioIssue};
