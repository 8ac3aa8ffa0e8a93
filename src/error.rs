//! Error types for Stoker
//!
//! All modules use `StokerResult<T>` as their return type. Every variant in
//! the launch-abort group terminates the launch; recoverable conditions
//! (missing cache record, unreachable patch payload with a patched bundle
//! already on disk, upgrade routine unavailable) are handled locally and
//! never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stoker operations
pub type StokerResult<T> = Result<T, StokerError>;

/// All errors that can occur in Stoker
#[derive(Error, Debug)]
pub enum StokerError {
    // Environment resolution errors
    #[error("Missing required setting: {0}")]
    MissingRequiredSetting(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Directory not writable after repair attempt: {0}")]
    DirectoryNotWritable(PathBuf),

    // Readiness errors
    #[error("Dependency unreachable: {host}:{port} after {attempts} attempts")]
    DependencyUnreachable {
        host: String,
        port: u16,
        attempts: u32,
    },

    // Build errors
    #[error("Dependency manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error("{step} failed with exit code {code}: {stderr}")]
    BuildFailed {
        step: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("{step} exceeded the {secs}s timeout")]
    BuildTimedOut { step: &'static str, secs: u64 },

    #[error("Upgrade routine unavailable: {0}")]
    UpgradeUnavailable(String),

    // Asset patcher errors
    #[error("Asset patch failed and no patched bundle exists: {0}")]
    AssetPatchFailed(String),

    // Preflight errors
    #[error("Preflight failed: {count} precondition(s) not met:\n{}", .details.join("\n"))]
    PreflightFailed { count: usize, details: Vec<String> },

    // Supervision errors
    #[error("Failed to hand off to managed process {command}: {source}")]
    HandoffFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Launch interrupted by termination signal")]
    Interrupted,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StokerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingRequiredSetting(_) => {
                Some("Set DB_HOST, DB_USER, DB_PASSWORD and DB_NAME in the environment")
            }
            Self::DependencyUnreachable { .. } => Some(
                "Check that the database container is running and reachable; raise DB_PROBE_ATTEMPTS if it is slow to start",
            ),
            Self::BuildTimedOut { .. } => Some("Raise BUILD_TIMEOUT_SECS for slow hosts"),
            Self::DirectoryNotWritable(_) => {
                Some("Fix ownership of the mounted volume to match the container user")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StokerError::MissingRequiredSetting("DB_HOST".to_string());
        assert!(err.to_string().contains("DB_HOST"));
    }

    #[test]
    fn error_hint() {
        let err = StokerError::MissingRequiredSetting("DB_NAME".to_string());
        assert!(err.hint().unwrap().contains("DB_HOST"));
        assert!(StokerError::Interrupted.hint().is_none());
    }

    #[test]
    fn preflight_display_lists_all_failures() {
        let err = StokerError::PreflightFailed {
            count: 2,
            details: vec![
                "config.json missing".to_string(),
                "node_modules missing".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("config.json missing"));
        assert!(text.contains("node_modules missing"));
        assert!(text.contains('2'));
    }
}
