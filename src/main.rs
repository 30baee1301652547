//! Sigrun CLI entry point

use clap::Parser;
use sigrun::cli::{Cli, Commands};
use sigrun::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("SIGRUN_LOG"))
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run(args) => sigrun::cli::run::run(args)?,
        Commands::Report(args) => sigrun::cli::report::run(args)?,
        Commands::Clean(args) => {
            sigrun::cli::clean::run(args)?;
            0
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
