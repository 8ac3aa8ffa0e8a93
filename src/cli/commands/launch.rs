//! Launch command - the full orchestration pipeline
//!
//! Resolve environment, prepare directories, write the config document,
//! wait for the database, build if needed, patch assets, validate, then
//! start and supervise the forum process. Every stage is a hard gate
//! except the asset patcher, whose failures are reported and tolerated as
//! long as a viable bundle exists.

use crate::assets::AssetPatcher;
use crate::build::{self, AppBuildRunner};
use crate::cache::{manifest_fingerprint, BuildDecision, CacheRecord};
use crate::cli::args::{LaunchArgs, SupervisorMode};
use crate::configfile;
use crate::error::{StokerError, StokerResult};
use crate::preflight;
use crate::probe;
use crate::settings::{self, LaunchConfig};
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::supervise::{build_strategy, AppProcess, Rebuilder, Supervisor};
use async_trait::async_trait;
use tracing::{info, warn};

/// Execute the launch command; returns the orchestrator's exit code
pub async fn execute(args: LaunchArgs) -> StokerResult<i32> {
    let (controller, mut shutdown) = ShutdownController::new();
    controller
        .listen_for_signals()
        .map_err(|e| StokerError::io("installing signal handlers", e))?;

    let config = LaunchConfig::from_env()?;
    info!("Launching forum from {}", config.app_dir.display());

    settings::prepare_directories(&config).await?;
    configfile::write(&config).await?;

    if args.skip_probe {
        warn!("Database readiness probe skipped");
    } else {
        probe::wait_for_tcp(
            &config.database.host,
            config.database.port,
            config.probe_attempts,
            config.probe_interval,
            &mut shutdown,
        )
        .await?;
    }

    run_build_stage(&config, config.force_build, &mut shutdown).await?;

    if args.skip_patch {
        warn!("Asset patch pass skipped");
    } else {
        let patcher = AssetPatcher::new(config.asset_dir(), config.patch_script_url.clone());
        match patcher.run().await {
            Ok(()) => {}
            Err(e @ StokerError::AssetPatchFailed(_)) => return Err(e),
            Err(e) => warn!("Asset patch failed (continuing): {}", e),
        }
    }

    preflight::run(&config).await?;

    match args.mode {
        SupervisorMode::Handoff => {
            // exec only returns on failure.
            Err(crate::supervise::handoff(&config))
        }
        SupervisorMode::Supervised => {
            let mut supervisor = Supervisor::new(
                Box::new(AppProcess::new(&config)),
                Box::new(PipelineRebuilder {
                    config: config.clone(),
                    shutdown: shutdown.clone(),
                }),
                build_strategy(&config.restart),
            );
            supervisor.run(&mut shutdown).await
        }
    }
}

/// Conditional build/upgrade stage shared with the `build` subcommand
pub(crate) async fn run_build_stage(
    config: &LaunchConfig,
    force: bool,
    shutdown: &mut ShutdownSignal,
) -> StokerResult<()> {
    let fingerprint = manifest_fingerprint(&config.manifest_path())?;
    let record = CacheRecord::new(config.cache_record_path());
    let decision = BuildDecision::decide(&fingerprint, record.load()?.as_deref(), force);

    if decision != BuildDecision::Skip {
        build::apply_lockfile_override(config).await?;
    }

    let runner = AppBuildRunner::new(config);
    let built = build::execute_decision(decision, &runner, &record, &fingerprint, shutdown).await?;

    if built {
        build::verify_build_output(&config.app_dir).await;
    }
    Ok(())
}

/// Rebuild hook for the supervised loop's rebuild-and-restart requests
struct PipelineRebuilder {
    config: LaunchConfig,
    shutdown: ShutdownSignal,
}

#[async_trait]
impl Rebuilder for PipelineRebuilder {
    async fn rebuild(&mut self) -> StokerResult<()> {
        // Forced: the process explicitly asked for a rebuild, regardless
        // of the manifest fingerprint.
        let mut shutdown = self.shutdown.clone();
        run_build_stage(&self.config, true, &mut shutdown).await
    }
}
