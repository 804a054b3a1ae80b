//! Deciding what a file-system change means.

use crate::pipeline::Pipeline;
use crate::source::SourceFilter;
use crate::watermark::WatermarkStore;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// What a batch of changes asks for.
///
/// Ordered by precedence: a batch takes the strongest action any of its
/// paths asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    /// Only the spelling dictionary changed.
    Spelling,
    /// Sources changed: compile and run the stages.
    Pass,
    /// Manifests changed: reset, reinstall, then run everything.
    Restart,
}

/// Maps changed paths to actions.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    roots: Vec<PathBuf>,
    state_file: PathBuf,
    dictionary: PathBuf,
    manifests: Vec<PathBuf>,
    sources: SourceFilter,
}

impl ChangeClassifier {
    /// Creates a classifier with the pipeline's configuration.
    #[must_use]
    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        let root = pipeline.root().to_path_buf();
        let mut roots = vec![root.clone()];
        if let Ok(canonical) = std::fs::canonicalize(&root) {
            if canonical != root {
                roots.push(canonical);
            }
        }
        let config = pipeline.config();
        Self {
            roots,
            state_file: config.state_file.clone(),
            dictionary: config.dictionary.clone(),
            manifests: pipeline.dependencies().manifests().to_vec(),
            sources: pipeline.source_filter().clone(),
        }
    }

    /// Makes `path` relative to the project root. Paths outside it are `None`.
    #[must_use]
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .map(Path::to_path_buf)
    }

    /// Classifies one changed path. `outputs` are the recorded build outputs.
    #[must_use]
    pub fn classify(&self, path: &Path, outputs: &BTreeSet<PathBuf>) -> Option<Action> {
        let relative = self.relative(path)?;
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => name == ".git",
            _ => false,
        });
        if hidden
            || WatermarkStore::is_state_path(&self.state_file, &relative)
            || outputs.contains(&relative)
            || self.sources.is_dependency_path(&relative)
        {
            return None;
        }
        if self.manifests.contains(&relative) {
            return Some(Action::Restart);
        }
        if relative == self.dictionary {
            return Some(Action::Spelling);
        }
        Some(Action::Pass)
    }

    /// Classifies a debounced batch.
    #[must_use]
    pub fn classify_all(&self, paths: &[PathBuf], outputs: &BTreeSet<PathBuf>) -> Option<Action> {
        paths.iter().filter_map(|p| self.classify(p, outputs)).max()
    }
}
