//! Stoker - forum service launch orchestrator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use stoker::cli::{Cli, Commands};
use stoker::error::{StokerError, StokerResult};
use tracing_subscriber::EnvFilter;

/// Exit code reported when the launch was cut short by a signal
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(StokerError::Interrupted) => {
            eprintln!("{} {}", style("Stopped:").yellow().bold(), StokerError::Interrupted);
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StokerResult<i32> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("stoker=warn"),
        1 => EnvFilter::new("stoker=info"),
        _ => EnvFilter::new("stoker=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        // Launch propagates the managed process's fatal exit code.
        Commands::Launch(args) => stoker::cli::commands::launch(args).await,
        Commands::Preflight => stoker::cli::commands::preflight().await.map(|()| 0),
        Commands::Build(args) => stoker::cli::commands::build(args).await.map(|()| 0),
        Commands::Config(args) => stoker::cli::commands::config(args).await.map(|()| 0),
    }
}
