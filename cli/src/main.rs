use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod error;
mod registry;

use cli::{Cli, Commands};
use error::{CliResult, to_exit_code};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = if cli.verbose {
        "cmdbridge=debug,cmdbridge_cli=debug"
    } else {
        "cmdbridge=info,cmdbridge_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    to_exit_code(run(cli))
}

fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Serve(args) => commands::serve::execute(&cli.settings, args),
        Commands::Settings(command) => commands::settings::execute(&cli.settings, command),
    }
}
