//! Build command - run only the conditional build/upgrade step

use crate::cli::args::BuildArgs;
use crate::error::StokerResult;
use crate::settings::{self, LaunchConfig};
use crate::shutdown::ShutdownSignal;
use console::style;
use tracing::info;

/// Execute the build command
pub async fn execute(args: BuildArgs) -> StokerResult<()> {
    let config = LaunchConfig::from_env()?;
    settings::prepare_directories(&config).await?;

    let force = args.force || config.force_build;
    info!("Evaluating build decision (force: {})", force);

    let mut shutdown = ShutdownSignal::never();
    super::launch::run_build_stage(&config, force, &mut shutdown).await?;

    println!("{} Build step complete", style("✓").green());
    Ok(())
}
