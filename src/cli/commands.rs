use clap::Subcommand;

use super::run::RunArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run one workflow from a scenario file
    Run(RunArgs),

    /// Check a scenario's plans without running them
    Validate(ValidateArgs),

    /// Print the effective configuration
    Config,
}
