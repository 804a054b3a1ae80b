//! The "dependencies changed" gate.
//!
//! Stage results computed against an older dependency tree can't be
//! trusted. When any manifest or lock file is newer than the oldest stage
//! watermark, dependencies are reinstalled and every watermark is reset.

use crate::errors::{Result, StagewatchError};
use crate::utils::{modified_time, Timestamp};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compares manifest modification times with stage watermarks.
#[derive(Debug, Clone)]
pub struct DependencyGate {
    root: PathBuf,
    manifests: Vec<PathBuf>,
}

impl DependencyGate {
    /// Creates a gate over `manifests`, relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, manifests: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifests,
        }
    }

    /// Returns the watched manifests.
    #[must_use]
    pub fn manifests(&self) -> &[PathBuf] {
        &self.manifests
    }

    /// Returns true if `path` (relative to the root) is a watched manifest.
    #[must_use]
    pub fn is_manifest(&self, path: &Path) -> bool {
        self.manifests.iter().any(|m| m == path)
    }

    /// Returns the newest modification time among the manifests that exist.
    pub fn latest_manifest(&self) -> Result<Option<Timestamp>> {
        let mut latest = None;
        for manifest in &self.manifests {
            let full = self.root.join(manifest);
            let modified = modified_time(&full).map_err(|e| StagewatchError::at_path(&full, e))?;
            latest = latest.max(modified);
        }
        Ok(latest)
    }

    /// Decides whether dependencies must be reinstalled.
    ///
    /// With no watermark at all nothing has been verified against the
    /// current tree, so the answer is yes.
    pub fn should_install(&self, oldest_watermark: Option<Timestamp>) -> Result<bool> {
        let Some(oldest) = oldest_watermark else {
            return Ok(true);
        };
        let latest = self.latest_manifest()?;
        debug!(?latest, %oldest, "Comparing manifests with watermarks");
        Ok(latest.is_some_and(|latest| latest > oldest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs::File;
    use std::time::SystemTime;

    fn gate_with_manifest(modified: SystemTime) -> (tempfile::TempDir, DependencyGate) {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("package.json"))
            .unwrap()
            .set_modified(modified)
            .unwrap();
        let gate = DependencyGate::new(
            dir.path(),
            vec![PathBuf::from("package.json"), PathBuf::from("package-lock.json")],
        );
        (dir, gate)
    }

    #[test]
    fn test_manifest_newer_than_watermarks() {
        let (_dir, gate) = gate_with_manifest(SystemTime::now());
        let oldest = crate::utils::now_utc() - Duration::hours(1);

        assert!(gate.should_install(Some(oldest)).unwrap());
    }

    #[test]
    fn test_watermarks_newer_than_manifest() {
        let hour_ago = SystemTime::now() - std::time::Duration::from_secs(3600);
        let (_dir, gate) = gate_with_manifest(hour_ago);

        assert!(!gate.should_install(Some(crate::utils::now_utc())).unwrap());
    }

    #[test]
    fn test_no_watermarks_means_install() {
        let dir = tempfile::tempdir().unwrap();
        let gate = DependencyGate::new(dir.path(), vec![PathBuf::from("package.json")]);

        assert!(gate.should_install(None).unwrap());
    }

    #[test]
    fn test_no_manifests_with_watermarks() {
        let dir = tempfile::tempdir().unwrap();
        let gate = DependencyGate::new(dir.path(), vec![PathBuf::from("package.json")]);

        assert_eq!(gate.latest_manifest().unwrap(), None);
        assert!(!gate.should_install(Some(crate::utils::now_utc())).unwrap());
    }

    #[test]
    fn test_is_manifest() {
        let (_dir, gate) = gate_with_manifest(SystemTime::now());
        assert!(gate.is_manifest(Path::new("package-lock.json")));
        assert!(!gate.is_manifest(Path::new("lib/package.json")));
    }
}
