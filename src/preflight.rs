//! Preflight validation gate
//!
//! Last stop before the managed process starts. Earlier stages can each
//! succeed individually and still leave the system unable to boot the
//! application, which would then fail far less diagnosably at its own
//! startup. Checks are independent and never short-circuit: the operator
//! gets every failure in one report instead of one crash trace per rerun.

use crate::configfile;
use crate::error::{StokerError, StokerResult};
use crate::settings::LaunchConfig;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Accumulated precondition failures
#[derive(Debug, Default)]
pub struct ValidationReport {
    failures: Vec<String>,
}

impl ValidationReport {
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.failures.push(detail.into());
    }

    pub fn count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Convert into a result: any accumulated failure aborts the launch
    pub fn into_result(self) -> StokerResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(StokerError::PreflightFailed {
                count: self.failures.len(),
                details: self.failures,
            })
        }
    }
}

/// Run every preflight check and collect all failures
pub async fn run(config: &LaunchConfig) -> StokerResult<()> {
    let report = collect(config).await;
    if report.count() == 0 {
        info!("Preflight passed");
    }
    report.into_result()
}

/// Run every check without converting to a result (used by `stoker preflight`)
pub async fn collect(config: &LaunchConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_config_file(config, &mut report);
    check_executable(&config.app_exec, &mut report);
    check_package_dir(config, &mut report);
    check_runtime_dirs(config, &mut report).await;
    check_runtime_smoke(&config.runtime_bin, &mut report).await;

    report
}

fn check_config_file(config: &LaunchConfig, report: &mut ValidationReport) {
    let path = configfile::runtime_path(config);
    if path.is_file() {
        debug!("Config file present: {}", path.display());
    } else {
        report.fail(format!("configuration file missing: {}", path.display()));
    }
}

fn check_executable(path: &Path, report: &mut ValidationReport) {
    if !path.is_file() {
        report.fail(format!("managed executable missing: {}", path.display()));
        return;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            report.fail(format!("managed executable not executable: {}", path.display()));
        }
    }
}

fn check_package_dir(config: &LaunchConfig, report: &mut ValidationReport) {
    let packages = config.app_dir.join("node_modules");
    if !packages.is_dir() {
        report.fail(format!(
            "dependency package directory missing: {} (was the build skipped?)",
            packages.display()
        ));
    }
}

async fn check_runtime_dirs(config: &LaunchConfig, report: &mut ValidationReport) {
    for dir in config.runtime_dirs() {
        // Creating missing directories is allowed here; only
        // non-writability is fatal.
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            report.fail(format!("cannot create directory {}: {e}", dir.display()));
            continue;
        }

        let probe = dir.join(".stoker-preflight-probe");
        match tokio::fs::write(&probe, b"probe").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
            }
            Err(e) => report.fail(format!("directory not writable: {} ({e})", dir.display())),
        }
    }
}

async fn check_runtime_smoke(runtime_bin: &str, report: &mut ValidationReport) {
    let status = Command::new(runtime_bin)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(s) if s.success() => debug!("Runtime smoke check passed: {} --version", runtime_bin),
        Ok(s) => report.fail(format!(
            "runtime smoke command failed: {} --version exited {}",
            runtime_bin,
            s.code().unwrap_or(-1)
        )),
        Err(e) => report.fail(format!("runtime not executable: {runtime_bin} ({e})")),
    }
}
