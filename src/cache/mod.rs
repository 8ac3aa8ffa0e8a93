//! Build cache: manifest fingerprinting and the conditional build decision
//!
//! The dependency manifest is hashed on every launch and compared against
//! the fingerprint persisted after the last successful build. Same
//! manifest = same dependency set = nothing to rebuild.

use crate::error::{StokerError, StokerResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the launch should do about the application build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    /// Dependencies changed since the last successful build
    Upgrade,
    /// Dependencies unchanged but a rebuild was forced
    Build,
    /// Nothing to do
    Skip,
}

impl BuildDecision {
    /// Derive the decision from the current fingerprint, the stored record
    /// and the force-build flag
    pub fn decide(current: &str, record: Option<&str>, force: bool) -> Self {
        match record {
            Some(stored) if stored == current => {
                if force {
                    Self::Build
                } else {
                    Self::Skip
                }
            }
            // Absent record never matches: first launch always upgrades.
            _ => Self::Upgrade,
        }
    }
}

/// Compute the SHA-256 fingerprint of the dependency manifest
pub fn manifest_fingerprint(manifest: &Path) -> StokerResult<String> {
    let contents = fs::read(manifest).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StokerError::MissingManifest(manifest.to_path_buf())
        } else {
            StokerError::io(format!("reading manifest {}", manifest.display()), e)
        }
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(hasher.finalize()))
}

/// The fingerprint persisted after the last successful build/upgrade
pub struct CacheRecord {
    path: PathBuf,
}

impl CacheRecord {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored fingerprint; a missing file means "never built"
    pub fn load(&self) -> StokerResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let fingerprint = content.trim().to_string();
                if fingerprint.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(fingerprint))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StokerError::io(
                format!("reading cache record {}", self.path.display()),
                e,
            )),
        }
    }

    /// Persist a fingerprint; called only after a successful build/upgrade
    pub fn store(&self, fingerprint: &str) -> StokerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StokerError::io(format!("creating cache record dir {}", parent.display()), e)
            })?;
        }
        fs::write(&self.path, format!("{fingerprint}\n")).map_err(|e| {
            StokerError::io(format!("writing cache record {}", self.path.display()), e)
        })?;
        debug!("Cache record updated: {}", &fingerprint[..12.min(fingerprint.len())]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fingerprint_deterministic() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("package.json");
        fs::write(&manifest, br#"{"dependencies":{}}"#).unwrap();

        let a = manifest_fingerprint(&manifest).unwrap();
        let b = manifest_fingerprint(&manifest).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("package.json");

        fs::write(&manifest, br#"{"dependencies":{"a":"1.0.0"}}"#).unwrap();
        let before = manifest_fingerprint(&manifest).unwrap();

        fs::write(&manifest, br#"{"dependencies":{"a":"2.0.0"}}"#).unwrap();
        let after = manifest_fingerprint(&manifest).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn missing_manifest_is_its_own_error() {
        let dir = TempDir::new().unwrap();
        let err = manifest_fingerprint(&dir.path().join("package.json")).unwrap_err();
        assert!(matches!(err, StokerError::MissingManifest(_)));
    }

    #[test]
    fn decision_matrix() {
        assert_eq!(BuildDecision::decide("abc", None, false), BuildDecision::Upgrade);
        assert_eq!(BuildDecision::decide("abc", Some("def"), false), BuildDecision::Upgrade);
        assert_eq!(BuildDecision::decide("abc", Some("def"), true), BuildDecision::Upgrade);
        assert_eq!(BuildDecision::decide("abc", Some("abc"), false), BuildDecision::Skip);
        assert_eq!(BuildDecision::decide("abc", Some("abc"), true), BuildDecision::Build);
    }

    #[test]
    fn record_roundtrip() {
        let dir = TempDir::new().unwrap();
        let record = CacheRecord::new(dir.path().join("state").join("build-fingerprint"));

        assert_eq!(record.load().unwrap(), None);
        record.store("deadbeef").unwrap();
        assert_eq!(record.load().unwrap().as_deref(), Some("deadbeef"));
    }

    #[test]
    fn unchanged_manifest_skips_on_second_launch() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("package.json");
        fs::write(&manifest, b"{}").unwrap();
        let record = CacheRecord::new(dir.path().join("build-fingerprint"));

        // First launch: no record yet.
        let fp = manifest_fingerprint(&manifest).unwrap();
        assert_eq!(
            BuildDecision::decide(&fp, record.load().unwrap().as_deref(), false),
            BuildDecision::Upgrade
        );
        record.store(&fp).unwrap();

        // Second launch, manifest unchanged.
        let fp2 = manifest_fingerprint(&manifest).unwrap();
        assert_eq!(
            BuildDecision::decide(&fp2, record.load().unwrap().as_deref(), false),
            BuildDecision::Skip
        );

        // Manifest edited between launches.
        fs::write(&manifest, br#"{"dependencies":{"b":"1"}}"#).unwrap();
        let fp3 = manifest_fingerprint(&manifest).unwrap();
        assert_eq!(
            BuildDecision::decide(&fp3, record.load().unwrap().as_deref(), false),
            BuildDecision::Upgrade
        );
    }
}
