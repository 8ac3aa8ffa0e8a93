//! Environment resolution for a launch attempt
//!
//! Turns the raw process environment into an immutable [`LaunchConfig`].
//! Resolution is pure: it reads a snapshot map and performs no filesystem,
//! network or process side effects, so a failed resolution leaves the host
//! untouched. Directory preparation is a separate, explicit step.

pub mod package_manager;

pub use package_manager::PackageManager;

use crate::error::{StokerError, StokerResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Database connection coordinates
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    pub auth_source: String,
    pub ssl: bool,
}

/// Which restart strategy the supervisor applies on a clean-restart request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategyKind {
    Local,
    Remote,
}

/// Restart strategy selection plus its remote-redeploy coordinates
#[derive(Debug, Clone)]
pub struct RestartSettings {
    pub kind: RestartStrategyKind,
    pub redeploy_url: Option<String>,
    pub redeploy_timeout: Duration,
}

/// Resolved, defaulted settings for one launch attempt.
///
/// Immutable once resolved; every field is either an explicit environment
/// value or a documented default.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub app_dir: PathBuf,
    pub app_exec: PathBuf,
    pub config_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
    pub package_manager: PackageManager,
    pub force_build: bool,
    pub override_lockfile: bool,
    pub database: DatabaseSettings,
    pub site_url: String,
    pub port: u16,
    pub session_secret: String,
    pub runtime_bin: String,
    pub probe_attempts: u32,
    pub probe_interval: Duration,
    pub build_timeout: Duration,
    pub restart: RestartSettings,
    pub patch_script_url: String,
}

/// Default payload injected into admin bundles by the asset patcher
const DEFAULT_PATCH_SCRIPT_URL: &str = "https://code.jquery.com/jquery-3.7.1.min.js";

/// Database settings that must be supplied explicitly, in report order
const REQUIRED_DB_KEYS: [&str; 4] = ["DB_HOST", "DB_USER", "DB_PASSWORD", "DB_NAME"];

impl LaunchConfig {
    /// Resolve from the current process environment
    pub fn from_env() -> StokerResult<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&vars)
    }

    /// Resolve from an environment snapshot
    pub fn resolve(vars: &HashMap<String, String>) -> StokerResult<Self> {
        for key in REQUIRED_DB_KEYS {
            if get(vars, key).is_none() {
                return Err(StokerError::MissingRequiredSetting(key.to_string()));
            }
        }

        let app_dir = PathBuf::from(get_or(vars, "APP_DIR", "/opt/forum"));
        let app_exec = match get(vars, "APP_EXEC") {
            Some(v) => PathBuf::from(v),
            None => app_dir.join("forum"),
        };
        let config_dir = PathBuf::from(get_or(vars, "CONFIG_DIR", "/opt/config"));
        let upload_dir = match get(vars, "UPLOAD_DIR") {
            Some(v) => PathBuf::from(v),
            None => app_dir.join("public").join("uploads"),
        };
        let log_dir = match get(vars, "LOG_DIR") {
            Some(v) => PathBuf::from(v),
            None => app_dir.join("logs"),
        };

        let database = DatabaseSettings {
            host: get(vars, "DB_HOST").unwrap_or_default(),
            port: parse_num(vars, "DB_PORT", 27017)?,
            username: get(vars, "DB_USER").unwrap_or_default(),
            password: get(vars, "DB_PASSWORD").unwrap_or_default(),
            name: get(vars, "DB_NAME").unwrap_or_default(),
            auth_source: get_or(vars, "DB_AUTH_SOURCE", "admin"),
            ssl: parse_bool(vars, "DB_SSL", false)?,
        };

        let restart_kind = match get_or(vars, "RESTART_STRATEGY", "local").to_ascii_lowercase().as_str() {
            "local" => RestartStrategyKind::Local,
            "remote" => RestartStrategyKind::Remote,
            other => {
                return Err(StokerError::InvalidSetting {
                    key: "RESTART_STRATEGY".to_string(),
                    reason: format!("unknown strategy '{other}' (expected local or remote)"),
                })
            }
        };
        let redeploy_url = get(vars, "REDEPLOY_URL");
        if restart_kind == RestartStrategyKind::Remote && redeploy_url.is_none() {
            return Err(StokerError::MissingRequiredSetting("REDEPLOY_URL".to_string()));
        }

        let session_secret = match get(vars, "SESSION_SECRET") {
            Some(secret) => secret,
            None => {
                debug!("SESSION_SECRET not supplied, generating one");
                uuid::Uuid::new_v4().to_string()
            }
        };

        Ok(Self {
            app_dir,
            app_exec,
            config_dir,
            upload_dir,
            log_dir,
            package_manager: PackageManager::parse(&get_or(vars, "PACKAGE_MANAGER", "npm"))?,
            force_build: parse_bool(vars, "FORCE_BUILD", false)?,
            override_lockfile: parse_bool(vars, "OVERRIDE_LOCKFILE", false)?,
            database,
            site_url: get_or(vars, "SITE_URL", "http://localhost:4567"),
            port: parse_num(vars, "PORT", 4567)?,
            session_secret,
            runtime_bin: get_or(vars, "RUNTIME_BIN", "node"),
            probe_attempts: parse_num(vars, "DB_PROBE_ATTEMPTS", 60)?,
            probe_interval: Duration::from_secs(parse_num(vars, "DB_PROBE_INTERVAL_SECS", 3u64)?),
            build_timeout: Duration::from_secs(parse_num(vars, "BUILD_TIMEOUT_SECS", 600u64)?),
            restart: RestartSettings {
                kind: restart_kind,
                redeploy_url,
                redeploy_timeout: Duration::from_secs(parse_num(
                    vars,
                    "REDEPLOY_TIMEOUT_SECS",
                    10u64,
                )?),
            },
            patch_script_url: get_or(vars, "PATCH_SCRIPT_URL", DEFAULT_PATCH_SCRIPT_URL),
        })
    }

    /// Path of the dependency manifest driving the build cache
    pub fn manifest_path(&self) -> PathBuf {
        self.app_dir.join("package.json")
    }

    /// Path of the persisted build fingerprint
    pub fn cache_record_path(&self) -> PathBuf {
        self.config_dir.join("build-fingerprint")
    }

    /// Built asset directory targeted by the patcher
    pub fn asset_dir(&self) -> PathBuf {
        self.app_dir.join("build").join("public")
    }

    /// Runtime directories that must exist and be writable
    pub fn runtime_dirs(&self) -> [&Path; 3] {
        [&self.config_dir, &self.upload_dir, &self.log_dir]
    }
}

fn get(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn get_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    get(vars, key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> StokerResult<bool> {
    match get(vars, key) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(StokerError::InvalidSetting {
                key: key.to_string(),
                reason: format!("'{other}' is not a boolean"),
            }),
        },
    }
}

fn parse_num<T>(vars: &HashMap<String, String>, key: &str, default: T) -> StokerResult<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match get(vars, key) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e| StokerError::InvalidSetting {
            key: key.to_string(),
            reason: format!("'{v}': {e}"),
        }),
    }
}

/// Ensure every runtime directory exists and is writable.
///
/// Missing directories are created. A directory failing the write probe
/// gets one permission repair (0o770) before the launch aborts with
/// `DirectoryNotWritable`.
pub async fn prepare_directories(config: &LaunchConfig) -> StokerResult<()> {
    for dir in config.runtime_dirs() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StokerError::io(format!("creating directory {}", dir.display()), e))?;

        if probe_writable(dir).await {
            continue;
        }

        warn!("{} not writable, attempting permission repair", dir.display());
        repair_permissions(dir)?;

        if !probe_writable(dir).await {
            return Err(StokerError::DirectoryNotWritable(dir.to_path_buf()));
        }
    }
    Ok(())
}

/// Check writability with an actual write, not a metadata guess
async fn probe_writable(dir: &Path) -> bool {
    let probe = dir.join(".stoker-write-probe");
    match fs::write(&probe, b"probe").await {
        Ok(()) => {
            let _ = fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}

#[cfg(unix)]
fn repair_permissions(dir: &Path) -> StokerResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o770);
    std::fs::set_permissions(dir, perms)
        .map_err(|e| StokerError::io(format!("repairing permissions on {}", dir.display()), e))
}

#[cfg(not(unix))]
fn repair_permissions(_dir: &Path) -> StokerResult<()> {
    Ok(())
}
