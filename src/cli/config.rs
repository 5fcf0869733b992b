use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::config::AppConfig;

pub fn cmd_config(config: &AppConfig) -> Result<ExitCode> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    println!("{yaml}");
    Ok(ExitCode::SUCCESS)
}
