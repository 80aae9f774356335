//! CLI module graph and command dispatch.

pub mod check;
pub mod command;
pub mod config;
pub mod output;
pub mod report;
pub mod run;

use command::{Cli, Commands, ConfigCommand};
use output::OutputConfig;

use crate::error::Result;

/// Apply global flags and run the selected command.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose), cli.color);

    match cli.command {
        Commands::Run(args) => run::execute(&args).await,
        Commands::Check(args) => check::execute(&args).await,
        Commands::Config(ConfigCommand::Validate(args)) => config::validate(&args),
    }
}
