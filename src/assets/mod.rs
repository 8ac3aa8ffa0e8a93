//! Asset patcher: inject the admin-UI scripting dependency into built bundles
//!
//! The normal build does not bundle the client-side library the admin UI
//! needs at runtime, so it is injected into the built admin bundles after
//! every build. Injection is idempotent by detection, not assumption: a
//! banner comment marks patched bundles and is re-scanned on every launch,
//! so container replacement (where only the asset directory survives)
//! cannot cause double injection. A verbatim `.orig` backup is written
//! beside each bundle before it is rewritten.

use crate::error::{StokerError, StokerResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// File name of the bundles the patch targets
const TARGET_BUNDLE_NAME: &str = "admin.min.js";

/// Suffix of the pre-patch backup copy
const BACKUP_SUFFIX: &str = "orig";

/// Idempotent post-build transformation of the built asset directory
pub struct AssetPatcher {
    asset_dir: PathBuf,
    payload_url: String,
    fetch_timeout: Duration,
}

/// Banner marking an already-patched bundle
fn banner(payload_url: &str) -> String {
    format!("/*! stoker:inject {payload_url} */")
}

impl AssetPatcher {
    pub fn new(asset_dir: PathBuf, payload_url: String) -> Self {
        Self {
            asset_dir,
            payload_url,
            fetch_timeout: Duration::from_secs(30),
        }
    }

    /// Run the patch pass.
    ///
    /// Payload-fetch failure is a warning when every target bundle is
    /// already patched (a previous launch produced a viable bundle) and
    /// `AssetPatchFailed` when an unpatched bundle exists and nothing can
    /// be injected into it.
    pub async fn run(&self) -> StokerResult<()> {
        let targets = find_bundles(&self.asset_dir)?;
        if targets.is_empty() {
            warn!("No {} bundles under {}", TARGET_BUNDLE_NAME, self.asset_dir.display());
            return Ok(());
        }

        let marker = banner(&self.payload_url);
        let unpatched: Vec<&PathBuf> = targets
            .iter()
            .filter(|path| !bundle_is_patched(path, &marker))
            .collect();

        if unpatched.is_empty() {
            info!("All {} bundle(s) already patched", targets.len());
            return Ok(());
        }

        let payload = match self.fetch_payload().await {
            Ok(payload) => payload,
            Err(e) => {
                let patched_exists = targets.len() > unpatched.len();
                if patched_exists {
                    warn!("Could not fetch patch payload ({}), keeping existing patched bundle(s)", e);
                    return Ok(());
                }
                return Err(StokerError::AssetPatchFailed(format!(
                    "payload fetch from {} failed on first launch: {e}",
                    self.payload_url
                )));
            }
        };

        self.patch_all(&payload)
    }

    /// Inject `payload` into every unpatched target bundle
    pub fn patch_all(&self, payload: &str) -> StokerResult<()> {
        let marker = banner(&self.payload_url);
        let mut patched = 0usize;

        for bundle in find_bundles(&self.asset_dir)? {
            if patch_bundle(&bundle, payload, &marker)? {
                info!("Patched {}", bundle.display());
                patched += 1;
            } else {
                debug!("Already patched: {}", bundle.display());
            }
        }

        if patched > 0 {
            info!("Injected admin dependency into {} bundle(s)", patched);
        }
        Ok(())
    }

    /// Fetch the payload over HTTP with a bounded timeout
    async fn fetch_payload(&self) -> StokerResult<String> {
        let url = self.payload_url.clone();
        let timeout = self.fetch_timeout;

        tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();

            let mut response = agent
                .get(&url)
                .call()
                .map_err(|e| StokerError::AssetPatchFailed(format!("GET {url}: {e}")))?;

            response
                .body_mut()
                .read_to_string()
                .map_err(|e| StokerError::AssetPatchFailed(format!("reading payload body: {e}")))
        })
        .await
        .map_err(|e| StokerError::AssetPatchFailed(format!("payload fetch task failed: {e}")))?
    }
}

/// Whether the bundle content already carries the injection banner
fn bundle_is_patched(path: &Path, marker: &str) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => content.contains(marker),
        Err(_) => false,
    }
}

/// Patch a single bundle; returns false when it was already patched
fn patch_bundle(path: &Path, payload: &str, marker: &str) -> StokerResult<bool> {
    let original = std::fs::read_to_string(path)
        .map_err(|e| StokerError::io(format!("reading bundle {}", path.display()), e))?;

    if original.contains(marker) {
        return Ok(false);
    }

    let backup = path.with_extension(format!(
        "{}.{BACKUP_SUFFIX}",
        path.extension().and_then(|e| e.to_str()).unwrap_or("js")
    ));
    std::fs::write(&backup, &original)
        .map_err(|e| StokerError::io(format!("writing backup {}", backup.display()), e))?;

    let patched = format!("{marker}\n{payload}\n{original}");
    std::fs::write(path, patched)
        .map_err(|e| StokerError::io(format!("rewriting bundle {}", path.display()), e))?;

    Ok(true)
}

/// Collect target bundles under the asset directory, recursively
fn find_bundles(asset_dir: &Path) -> StokerResult<Vec<PathBuf>> {
    let mut bundles = Vec::new();
    if !asset_dir.is_dir() {
        return Ok(bundles);
    }
    walk(asset_dir, &mut bundles)?;
    bundles.sort();
    Ok(bundles)
}

fn walk(dir: &Path, bundles: &mut Vec<PathBuf>) -> StokerResult<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StokerError::io(format!("scanning {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| StokerError::io(format!("scanning {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, bundles)?;
        } else if path.file_name().is_some_and(|n| n == TARGET_BUNDLE_NAME) {
            bundles.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patcher(dir: &TempDir) -> AssetPatcher {
        AssetPatcher::new(
            dir.path().to_path_buf(),
            "https://example.invalid/lib.js".to_string(),
        )
    }

    fn write_bundle(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "console.log('admin');\n").unwrap();
        path
    }

    #[test]
    fn patch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "admin/admin.min.js");
        let patcher = patcher(&dir);

        patcher.patch_all("function lib(){}").unwrap();
        let once = std::fs::read(&bundle).unwrap();

        patcher.patch_all("function lib(){}").unwrap();
        let twice = std::fs::read(&bundle).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn patch_prepends_payload_and_keeps_original() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "admin.min.js");
        patcher(&dir).patch_all("function lib(){}").unwrap();

        let content = std::fs::read_to_string(&bundle).unwrap();
        assert!(content.starts_with("/*! stoker:inject "));
        assert!(content.contains("function lib(){}"));
        assert!(content.ends_with("console.log('admin');\n"));
    }

    #[test]
    fn backup_holds_pre_patch_content() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "admin.min.js");
        patcher(&dir).patch_all("lib").unwrap();

        let backup = bundle.with_extension("js.orig");
        assert_eq!(
            std::fs::read_to_string(backup).unwrap(),
            "console.log('admin');\n"
        );
    }

    #[test]
    fn only_target_bundles_are_touched() {
        let dir = TempDir::new().unwrap();
        write_bundle(dir.path(), "admin.min.js");
        let other = dir.path().join("forum.min.js");
        std::fs::write(&other, "app").unwrap();

        patcher(&dir).patch_all("lib").unwrap();
        assert_eq!(std::fs::read_to_string(&other).unwrap(), "app");
    }

    #[test]
    fn missing_asset_dir_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let bundles = find_bundles(&dir.path().join("nope")).unwrap();
        assert!(bundles.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_fatal_when_no_patched_bundle() {
        let dir = TempDir::new().unwrap();
        write_bundle(dir.path(), "admin.min.js");
        // example.invalid never resolves, so the fetch fails fast.
        let err = patcher(&dir).run().await.unwrap_err();
        assert!(matches!(err, StokerError::AssetPatchFailed(_)));
    }

    #[tokio::test]
    async fn fetch_failure_tolerated_when_patched_bundle_exists() {
        let dir = TempDir::new().unwrap();
        write_bundle(dir.path(), "a/admin.min.js");
        write_bundle(dir.path(), "b/admin.min.js");
        let patcher = patcher(&dir);

        // Pre-patch one bundle, leave the other untouched.
        let marker = banner(&patcher.payload_url);
        patch_bundle(&dir.path().join("a/admin.min.js"), "lib", &marker).unwrap();

        patcher.run().await.unwrap();
    }

    #[tokio::test]
    async fn no_bundles_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        patcher(&dir).run().await.unwrap();
    }
}
