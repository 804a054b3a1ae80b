//! Source file and test artifact selection.

use crate::config::{SourceConfig, TestLayout};
use std::path::{Path, PathBuf};

/// Decides which compiler inputs are project source files.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    config: SourceConfig,
}

impl SourceFilter {
    /// Creates a filter from configuration.
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Returns true if `path` lies inside a package-manager directory.
    #[must_use]
    pub fn is_dependency_path(&self, path: &Path) -> bool {
        path.components().any(|component| {
            let name = component.as_os_str();
            self.config.dependency_dirs.iter().any(|dir| name == dir.as_str())
        })
    }

    /// Returns true if `path` is a hand-written source file.
    #[must_use]
    pub fn is_source(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext == self.config.extension.as_str());
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let generated = self
            .config
            .excluded_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()));

        has_extension && !generated && !self.is_dependency_path(path)
    }

    /// Keeps the source files of `inputs`, in order.
    #[must_use]
    pub fn select(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        inputs.iter().filter(|p| self.is_source(p)).cloned().collect()
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::new(SourceConfig::default())
    }
}

/// Picks which emitted test artifacts to run.
#[derive(Debug, Clone)]
pub struct TestSelector {
    layout: TestLayout,
    excluded_suffixes: Vec<String>,
}

impl TestSelector {
    /// Creates a selector for `layout`; files ending in `excluded_suffixes`
    /// (declaration files) are never run.
    #[must_use]
    pub fn new(layout: TestLayout, excluded_suffixes: Vec<String>) -> Self {
        Self {
            layout,
            excluded_suffixes,
        }
    }

    /// Returns the compile outputs that are runnable tests.
    #[must_use]
    pub fn test_artifacts(&self, outputs: &[PathBuf]) -> Vec<PathBuf> {
        outputs
            .iter()
            .filter(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                path.parent() == Some(self.layout.directory.as_path())
                    && path
                        .extension()
                        .is_some_and(|ext| ext == self.layout.output_extension.as_str())
                    && !self.excluded_suffixes.iter().any(|s| name.ends_with(s.as_str()))
            })
            .cloned()
            .collect()
    }

    /// Narrows `tests` to the ones worth running for `changed`.
    ///
    /// Nothing changed means nothing to run. When every change is a test
    /// source, only the artifacts compiled from those sources run; any other
    /// change runs the whole suite.
    #[must_use]
    pub fn select(&self, tests: &[PathBuf], changed: &[PathBuf]) -> Vec<PathBuf> {
        if changed.is_empty() {
            return Vec::new();
        }
        let only_tests_changed = changed
            .iter()
            .all(|file| file.parent() == Some(self.layout.directory.as_path()));
        if !only_tests_changed {
            return tests.to_vec();
        }
        tests
            .iter()
            .filter(|test| {
                test.file_stem().is_some_and(|stem| {
                    let mut source = self.layout.directory.join(stem);
                    source.set_extension(&self.layout.source_extension);
                    changed.contains(&source)
                })
            })
            .cloned()
            .collect()
    }
}

impl Default for TestSelector {
    fn default() -> Self {
        Self::new(TestLayout::default(), SourceConfig::default().excluded_suffixes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_select_sources() {
        let filter = SourceFilter::default();
        let inputs = paths(&[
            "lib/a.ts",
            "lib/a.d.ts",
            "node_modules/x/index.ts",
            "lib/vendor/node_modules/y.ts",
            "README.md",
            "test/a.ts",
        ]);

        assert_eq!(filter.select(&inputs), paths(&["lib/a.ts", "test/a.ts"]));
    }

    #[test]
    fn test_dependency_path() {
        let filter = SourceFilter::default();
        assert!(filter.is_dependency_path(Path::new("node_modules/pkg/package.json")));
        assert!(!filter.is_dependency_path(Path::new("lib/node_modules_helper.ts")));
    }

    #[test]
    fn test_artifacts_are_emitted_tests_only() {
        let selector = TestSelector::default();
        let outputs = paths(&["test/a.js", "test/a.d.ts", "test/a.js.map", "lib/a.js", "test/sub/b.js"]);

        assert_eq!(selector.test_artifacts(&outputs), paths(&["test/a.js"]));
    }

    #[test]
    fn test_select_nothing_changed() {
        let selector = TestSelector::default();
        assert!(selector.select(&paths(&["test/a.js"]), &[]).is_empty());
    }

    #[test]
    fn test_select_only_changed_tests() {
        let selector = TestSelector::default();
        let tests = paths(&["test/a.js", "test/b.js", "test/c.js"]);

        let selected = selector.select(&tests, &paths(&["test/b.ts"]));

        assert_eq!(selected, paths(&["test/b.js"]));
    }

    #[test]
    fn test_select_everything_when_library_changed() {
        let selector = TestSelector::default();
        let tests = paths(&["test/a.js", "test/b.js"]);

        let selected = selector.select(&tests, &paths(&["test/b.ts", "lib/util.ts"]));

        assert_eq!(selected, tests);
    }
}
