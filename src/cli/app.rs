use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<ExitCode> {
    let cli = CliArgs::parse();

    // Logging is configured from the file, so the file is read before the subscriber exists.
    let LoadedConfig {
        config,
        path,
        missing,
    } = load_config(cli.config.as_deref()).await?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, cli.debug, config.logging.json)?;

    info!("Starting Stepwise v{}", env!("CARGO_PKG_VERSION"));
    match (&path, &missing) {
        (Some(path), _) => info!("Loaded configuration from: {}", path.display()),
        (None, Some(missing)) => {
            warn!("Config file not found, using defaults: {}", missing.display())
        }
        (None, None) => info!("Using default configuration"),
    }

    match dispatch(&cli, &config).await {
        Ok(code) => {
            info!("Command completed");
            Ok(code)
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
