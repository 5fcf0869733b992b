pub mod app;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod run;
pub mod runtime;
pub mod validate;

pub use app::run;
