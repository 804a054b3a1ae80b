//! Project fixtures.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::MockCollaborators;
use crate::collaborators::CompileReport;
use crate::config::StagewatchConfig;
use crate::pipeline::Pipeline;

/// A throwaway project directory.
///
/// Files are written with explicit modification times so staleness can be
/// tested without sleeping.
#[derive(Debug)]
pub struct ProjectFixture {
    dir: tempfile::TempDir,
}

impl ProjectFixture {
    /// Creates an empty project.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory can't be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp project"),
        }
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `name` with a modification time `age` in the past.
    ///
    /// # Panics
    ///
    /// Panics on any file-system failure.
    pub fn write_aged(&self, name: &str, age: Duration) -> PathBuf {
        self.write_at(name, SystemTime::now() - age)
    }

    /// Writes `name` with a modification time `ahead` in the future.
    ///
    /// Used to model an edit made after the last recorded watermark.
    ///
    /// # Panics
    ///
    /// Panics on any file-system failure.
    pub fn touch_ahead(&self, name: &str, ahead: Duration) -> PathBuf {
        self.write_at(name, SystemTime::now() + ahead)
    }

    /// Writes `name` with the given modification time.
    ///
    /// # Panics
    ///
    /// Panics on any file-system failure.
    pub fn write_at(&self, name: &str, modified: SystemTime) -> PathBuf {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, name).expect("write file");
        File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(modified))
            .expect("set mtime");
        PathBuf::from(name)
    }

    /// Writes `count` sources `lib/f{i}.ts`, an hour old.
    pub fn write_sources(&self, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| self.write_aged(&format!("lib/f{i}.ts"), Duration::from_secs(3600)))
            .collect()
    }

    /// Returns true if `name` exists in the project.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.root().join(name).exists()
    }

    /// Configuration for fixture projects: npm manifests at the root only.
    #[must_use]
    pub fn config() -> StagewatchConfig {
        StagewatchConfig::new().with_manifests(["package.json", "package-lock.json"])
    }

    /// Builds a pipeline over `mocks`.
    ///
    /// # Panics
    ///
    /// Panics if the state file can't be loaded.
    #[must_use]
    pub fn pipeline(&self, mocks: &MockCollaborators) -> Pipeline {
        Pipeline::builder(self.root())
            .config(Self::config())
            .collaborators(mocks.collaborators())
            .build()
            .expect("build pipeline")
    }

    /// Makes `mocks` compile `sources` into `outputs`, creating the outputs.
    pub fn compiles_to(&self, mocks: &MockCollaborators, sources: &[PathBuf], outputs: &[&str]) {
        let outputs = outputs
            .iter()
            .map(|name| self.write_aged(name, Duration::from_secs(60)))
            .collect();
        mocks
            .compiler
            .set_report(CompileReport::succeeded(sources.to_vec(), outputs));
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
