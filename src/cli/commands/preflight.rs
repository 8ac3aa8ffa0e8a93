//! Preflight command - run only the validation gate

use crate::error::{StokerError, StokerResult};
use crate::preflight;
use crate::settings::LaunchConfig;
use console::style;

/// Execute the preflight command
pub async fn execute() -> StokerResult<()> {
    let config = LaunchConfig::from_env()?;
    let report = preflight::collect(&config).await;

    if report.count() == 0 {
        println!("{} Preflight passed", style("✓").green());
        return Ok(());
    }

    for failure in report.failures() {
        println!("{} {}", style("✗").red(), failure);
    }

    Err(StokerError::PreflightFailed {
        count: report.count(),
        details: report.failures().to_vec(),
    })
}
