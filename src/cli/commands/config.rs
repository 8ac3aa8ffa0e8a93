//! Config command - show or write the generated configuration document

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::configfile;
use crate::error::StokerResult;
use crate::settings::{self, LaunchConfig};
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs) -> StokerResult<()> {
    let config = LaunchConfig::from_env()?;

    match args.action {
        ConfigAction::Show => {
            print!("{}", configfile::render(&config)?);
        }
        ConfigAction::Write => {
            settings::prepare_directories(&config).await?;
            let path = configfile::write(&config).await?;
            println!("{} Configuration written to {}", style("✓").green(), path.display());
        }
    }

    Ok(())
}
