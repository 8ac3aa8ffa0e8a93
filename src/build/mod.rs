//! Conditional build/upgrade execution
//!
//! Runs the managed application's own build or upgrade routine under a
//! hard timeout, persisting the manifest fingerprint only after success.
//! A broken or timed-out build aborts the launch: starting the service on
//! stale assets fails much later and much less diagnosably.

use crate::cache::{BuildDecision, CacheRecord};
use crate::error::{StokerError, StokerResult};
use crate::settings::LaunchConfig;
use crate::shutdown::ShutdownSignal;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Build output directories the verification pass expects
const EXPECTED_OUTPUT_DIRS: [&str; 2] = ["build", "build/public"];

/// Cache-busting marker consulted by the application's asset URLs
const CACHE_BUSTER_FILE: &str = "build/cache-buster";

/// Abstraction over the managed application's build routines
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Run the upgrade routine (dependency install + migration + build)
    async fn upgrade(&self) -> StokerResult<()>;

    /// Run the plain build routine
    async fn build(&self) -> StokerResult<()>;
}

/// Runs `<app_exec> upgrade` / `<app_exec> build` in the application
/// directory with a hard timeout
pub struct AppBuildRunner {
    app_exec: PathBuf,
    app_dir: PathBuf,
    timeout: Duration,
}

impl AppBuildRunner {
    pub fn new(config: &LaunchConfig) -> Self {
        Self {
            app_exec: config.app_exec.clone(),
            app_dir: config.app_dir.clone(),
            timeout: config.build_timeout,
        }
    }

    async fn run_step(&self, step: &'static str) -> StokerResult<()> {
        info!("Running {} {} (timeout {}s)", self.app_exec.display(), step, self.timeout.as_secs());

        let output_fut = Command::new(&self.app_exec)
            .arg(step)
            .current_dir(&self.app_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the future on timeout kills the child via kill_on_drop.
        let output = match tokio::time::timeout(self.timeout, output_fut).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound && step == "upgrade" {
                    StokerError::UpgradeUnavailable(format!(
                        "{} not found",
                        self.app_exec.display()
                    ))
                } else {
                    StokerError::command_failed(
                        format!("{} {}", self.app_exec.display(), step),
                        e,
                    )
                }
            })?,
            Err(_) => {
                return Err(StokerError::BuildTimedOut {
                    step,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            info!("{} completed", step);
            Ok(())
        } else {
            Err(StokerError::BuildFailed {
                step,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl BuildRunner for AppBuildRunner {
    async fn upgrade(&self) -> StokerResult<()> {
        self.run_step("upgrade").await
    }

    async fn build(&self) -> StokerResult<()> {
        self.run_step("build").await
    }
}

/// Remove the package manager's lockfile when the override flag is set, so
/// the next install re-resolves the dependency tree
pub async fn apply_lockfile_override(config: &LaunchConfig) -> StokerResult<()> {
    if !config.override_lockfile {
        return Ok(());
    }

    let lockfile = config.app_dir.join(config.package_manager.lockfile());
    match fs::remove_file(&lockfile).await {
        Ok(()) => {
            warn!("OVERRIDE_LOCKFILE set, removed {}", lockfile.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StokerError::io(
            format!("removing lockfile {}", lockfile.display()),
            e,
        )),
    }
}

/// Execute a build decision.
///
/// `Upgrade` falls back to a plain build when the upgrade routine is
/// unavailable (first deploy, for instance); the fallback is logged, never
/// silent. The cache record is stored only after the routine succeeds.
/// Returns whether any build routine ran.
pub async fn execute_decision(
    decision: BuildDecision,
    runner: &dyn BuildRunner,
    record: &CacheRecord,
    fingerprint: &str,
    shutdown: &mut ShutdownSignal,
) -> StokerResult<bool> {
    match decision {
        BuildDecision::Skip => {
            info!("Dependencies unchanged, skipping build");
            Ok(false)
        }
        BuildDecision::Build => {
            info!("Forced rebuild requested");
            cancellable(runner.build(), shutdown).await?;
            record.store(fingerprint)?;
            Ok(true)
        }
        BuildDecision::Upgrade => {
            info!("Dependency manifest changed, upgrading");
            match cancellable(runner.upgrade(), shutdown).await {
                Ok(()) => {}
                Err(StokerError::UpgradeUnavailable(reason)) => {
                    warn!("Upgrade routine unavailable ({}), falling back to plain build", reason);
                    cancellable(runner.build(), shutdown).await?;
                }
                Err(e) => return Err(e),
            }
            record.store(fingerprint)?;
            Ok(true)
        }
    }
}

async fn cancellable<F>(fut: F, shutdown: &mut ShutdownSignal) -> StokerResult<()>
where
    F: std::future::Future<Output = StokerResult<()>>,
{
    tokio::select! {
        result = fut => result,
        _ = shutdown.recv() => Err(StokerError::Interrupted),
    }
}

/// Post-build verification: advisory bookkeeping only, never blocks startup.
///
/// Checks that the expected output directories exist and that the
/// cache-busting marker is present, writing a timestamp-derived one when it
/// is missing.
pub async fn verify_build_output(app_dir: &Path) {
    for dir in EXPECTED_OUTPUT_DIRS {
        let path = app_dir.join(dir);
        if !path.is_dir() {
            warn!("Expected build output directory missing: {}", path.display());
        }
    }

    let marker = app_dir.join(CACHE_BUSTER_FILE);
    if marker.is_file() {
        debug!("Cache buster present: {}", marker.display());
        return;
    }

    let token = format!("{:x}\n", Utc::now().timestamp_millis());
    if let Err(e) = fs::write(&marker, token).await {
        warn!("Could not write cache buster {}: {}", marker.display(), e);
    } else {
        info!("Wrote missing cache buster {}", marker.display());
    }
}
