//! Project configuration.
//!
//! Read from an optional `stagewatch.json` in the project root. Every key
//! has a default, so a missing file (or an empty object) describes a
//! TypeScript project driven by npm.

use crate::errors::{is_not_found, Result, StagewatchError};
use crate::source::{SourceFilter, TestSelector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagewatchConfig {
    /// State file, relative to the root.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Which compiler inputs count as source files.
    #[serde(default)]
    pub source: SourceConfig,
    /// Manifest and lock files whose change forces a reinstall.
    #[serde(default = "default_manifests")]
    pub manifests: Vec<PathBuf>,
    /// Project spelling dictionary.
    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,
    /// Files always spell-checked in addition to the changed sources.
    #[serde(default = "default_spelling_extras")]
    pub spelling_extras: Vec<PathBuf>,
    /// Test layout.
    #[serde(default)]
    pub tests: TestLayout,
    /// Window for grouping bursts of file-system events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Toolchain compatibility check.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Collaborator commands.
    #[serde(default)]
    pub commands: CommandsConfig,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".timestamps.json")
}

fn default_manifests() -> Vec<PathBuf> {
    [
        "package.json",
        "package-lock.json",
        "example/package.json",
        "example/package-lock.json",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_dictionary() -> PathBuf {
    PathBuf::from("dictionary.txt")
}

fn default_spelling_extras() -> Vec<PathBuf> {
    vec![PathBuf::from("package.json"), PathBuf::from("example/package.json")]
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for StagewatchConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            source: SourceConfig::default(),
            manifests: default_manifests(),
            dictionary: default_dictionary(),
            spelling_extras: default_spelling_extras(),
            tests: TestLayout::default(),
            debounce_ms: default_debounce_ms(),
            toolchain: ToolchainConfig::default(),
            commands: CommandsConfig::default(),
        }
    }
}

impl StagewatchConfig {
    /// Configuration file name, relative to the project root.
    pub const FILE_NAME: &'static str = "stagewatch.json";

    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `stagewatch.json` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(Self::FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StagewatchError::Config { path, source })
            }
            Err(e) if is_not_found(&e) => Ok(Self::default()),
            Err(e) => Err(StagewatchError::at_path(&path, e)),
        }
    }

    /// Sets the manifests.
    #[must_use]
    pub fn with_manifests<I, P>(mut self, manifests: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.manifests = manifests.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the debounce window.
    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Sets the collaborator commands.
    #[must_use]
    pub fn with_commands(mut self, commands: CommandsConfig) -> Self {
        self.commands = commands;
        self
    }

    /// Builds the source filter described by this configuration.
    #[must_use]
    pub fn source_filter(&self) -> SourceFilter {
        SourceFilter::new(self.source.clone())
    }

    /// Builds the test selector described by this configuration.
    #[must_use]
    pub fn test_selector(&self) -> TestSelector {
        TestSelector::new(self.tests.clone(), self.source.excluded_suffixes.clone())
    }

    /// Gets the debounce window as Duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Source file selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Extension of source files, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Suffixes of generated declaration files that share the extension.
    #[serde(default = "default_excluded_suffixes")]
    pub excluded_suffixes: Vec<String>,
    /// Directory names owned by the package manager.
    #[serde(default = "default_dependency_dirs")]
    pub dependency_dirs: Vec<String>,
}

fn default_extension() -> String {
    "ts".to_string()
}

fn default_excluded_suffixes() -> Vec<String> {
    vec![".d.ts".to_string()]
}

fn default_dependency_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            excluded_suffixes: default_excluded_suffixes(),
            dependency_dirs: default_dependency_dirs(),
        }
    }
}

/// Where tests live and what compiling them produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLayout {
    /// Test directory, relative to the root.
    #[serde(default = "default_test_directory")]
    pub directory: PathBuf,
    /// Extension of test sources.
    #[serde(default = "default_extension")]
    pub source_extension: String,
    /// Extension of emitted, runnable test artifacts.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

fn default_test_directory() -> PathBuf {
    PathBuf::from("test")
}

fn default_output_extension() -> String {
    "js".to_string()
}

impl Default for TestLayout {
    fn default() -> Self {
        Self {
            directory: default_test_directory(),
            source_extension: default_extension(),
            output_extension: default_output_extension(),
        }
    }
}

/// Toolchain compatibility check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Command printing the toolchain version.
    #[serde(default)]
    pub command: Vec<String>,
    /// Minimum version, e.g. `>=20.11`.
    #[serde(default)]
    pub minimum: Option<String>,
}

/// Argument vectors of the external collaborators.
///
/// Files are appended to checker commands. An empty vector disables the
/// collaborator: the stage then passes trivially.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Prints `{"sourceFiles": [...], "outputFiles": [...]}` on stdout.
    #[serde(default)]
    pub compile: Vec<String>,
    /// Style checker.
    #[serde(default)]
    pub format: Vec<String>,
    /// Spell checker.
    #[serde(default)]
    pub spelling: Vec<String>,
    /// Linter.
    #[serde(default)]
    pub lint: Vec<String>,
    /// Test runner; emitted test files are appended.
    #[serde(default)]
    pub test: Vec<String>,
    /// Package manager install.
    #[serde(default)]
    pub install: Vec<String>,
    /// Extra environment for every collaborator process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
