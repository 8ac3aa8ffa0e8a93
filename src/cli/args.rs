//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Stoker - forum service launch orchestrator
///
/// Takes a freshly deployed host from "code present, nothing running" to
/// "service accepting traffic": waits for the database, rebuilds when
/// dependencies changed, validates preconditions, then starts and
/// supervises the forum process.
#[derive(Parser, Debug)]
#[command(name = "stoker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full launch pipeline and start the forum process
    Launch(LaunchArgs),

    /// Run only the preflight validation gate and report every failure
    Preflight,

    /// Run only the conditional build/upgrade step
    Build(BuildArgs),

    /// Show or write the generated configuration document
    Config(ConfigArgs),
}

/// How the orchestrator runs the managed process
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorMode {
    /// Stay resident and relaunch based on exit codes
    Supervised,
    /// Replace the orchestrator's process image with the forum process
    Handoff,
}

/// Arguments for the launch command
#[derive(Parser, Debug)]
pub struct LaunchArgs {
    /// Supervision mode after the pipeline completes
    #[arg(short, long, value_enum, default_value = "supervised", env = "SUPERVISOR_MODE")]
    pub mode: SupervisorMode,

    /// Skip the database readiness probe
    #[arg(long)]
    pub skip_probe: bool,

    /// Skip the asset patch pass
    #[arg(long)]
    pub skip_patch: bool,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Rebuild even when the dependency manifest is unchanged
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the rendered configuration document
    Show,
    /// Write the document to the config directory and application mirror
    Write,
}
