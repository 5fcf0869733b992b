use std::process::ExitCode;

use anyhow::Result;

use super::config::cmd_config;
use super::env::CliArgs;
use super::run::cmd_run;
use super::validate::cmd_validate;
use crate::cli::commands::Commands;
use crate::config::AppConfig;

pub async fn dispatch(cli: &CliArgs, config: &AppConfig) -> Result<ExitCode> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, config, cli.output).await,
        Commands::Validate(args) => cmd_validate(args, config, cli.output),
        Commands::Config => cmd_config(config),
    }
}
