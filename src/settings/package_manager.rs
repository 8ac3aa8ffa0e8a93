//! Package manager selection for the managed application
//!
//! The forum application is a Node project; which package manager drives
//! dependency installation is an operator choice. Each manager knows its
//! lockfile name so the lock-override flag can remove the right file.

use crate::error::{StokerError, StokerResult};
use std::fmt;

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    /// npm (package-lock.json)
    Npm,
    /// Yarn (yarn.lock)
    Yarn,
    /// pnpm (pnpm-lock.yaml)
    Pnpm,
}

impl PackageManager {
    /// Parse the PACKAGE_MANAGER setting
    pub fn parse(value: &str) -> StokerResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "yarn" => Ok(Self::Yarn),
            "pnpm" => Ok(Self::Pnpm),
            other => Err(StokerError::InvalidSetting {
                key: "PACKAGE_MANAGER".to_string(),
                reason: format!("unknown package manager '{other}' (expected npm, yarn or pnpm)"),
            }),
        }
    }

    /// The binary to invoke
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Lockfile name written by this manager
    pub fn lockfile(&self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Yarn => "yarn.lock",
            Self::Pnpm => "pnpm-lock.yaml",
        }
    }

    /// Argv for a dependency install in the application directory
    pub fn install_args(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["install", "--omit=dev"],
            Self::Yarn => &["install", "--production"],
            Self::Pnpm => &["install", "--prod"],
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary())
    }
}
