//! External collaborators.
//!
//! The orchestrator never analyses code itself. Compiling, checking,
//! testing and installing are delegated through the traits below; the
//! `command` module backs each of them with a configured external program.

mod command;
mod process;
mod toolchain;

pub use command::{
    CommandChecker, CommandCompiler, CommandPackageManager, CommandTestRunner, CommandToolchain,
};
pub use process::{run_command, CommandOutput};
pub use toolchain::{check_toolchain, VersionRequirement};

use crate::cancellation::CancellationToken;
use crate::config::StagewatchConfig;
use crate::core::Stage;
use crate::errors::Result;
use crate::reporter::Reporter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What one compilation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    /// Every file the compiler read, relative to the root.
    pub source_files: Vec<PathBuf>,
    /// Emitted files; `None` when compilation failed.
    pub output_files: Option<Vec<PathBuf>>,
}

impl CompileReport {
    /// A successful compilation.
    #[must_use]
    pub fn succeeded(source_files: Vec<PathBuf>, output_files: Vec<PathBuf>) -> Self {
        Self {
            source_files,
            output_files: Some(output_files),
        }
    }

    /// A failed compilation.
    #[must_use]
    pub fn failed(source_files: Vec<PathBuf>) -> Self {
        Self {
            source_files,
            output_files: None,
        }
    }

    /// Returns true if outputs were emitted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.output_files.is_some()
    }
}

/// Type-checks and emits the project.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles the project at `root`, reporting diagnostics.
    async fn compile(&self, root: &Path, reporter: &dyn Reporter) -> Result<CompileReport>;
}

/// A per-file verification tool: formatter, spell checker or linter.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Checks `files`. Returns false when problems were reported.
    async fn check(
        &self,
        root: &Path,
        files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool>;

    /// Drops any cache the tool keeps between runs.
    fn invalidate_cache(&self) {}
}

/// Runs emitted test files.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Runs the tests among `test_files` worth running for `changed_files`.
    async fn run_tests(
        &self,
        root: &Path,
        test_files: &[PathBuf],
        changed_files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool>;
}

/// Installs project dependencies.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Installs dependencies. Returns false when the install failed.
    async fn install(
        &self,
        root: &Path,
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool>;
}

/// Reports the running toolchain version.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Returns the version, or `None` when it can't be determined.
    async fn version(&self) -> Result<Option<String>>;
}

/// The full set of collaborators a pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Compiler.
    pub compiler: Arc<dyn Compiler>,
    /// Style checker.
    pub formatter: Arc<dyn Checker>,
    /// Spell checker.
    pub spelling: Arc<dyn Checker>,
    /// Linter.
    pub linter: Arc<dyn Checker>,
    /// Test runner.
    pub tests: Arc<dyn TestRunner>,
    /// Package manager.
    pub packages: Arc<dyn PackageManager>,
    /// Toolchain probe.
    pub toolchain: Arc<dyn Toolchain>,
}

impl Collaborators {
    /// Builds command-backed collaborators from configuration.
    #[must_use]
    pub fn from_config(config: &StagewatchConfig) -> Self {
        let commands = &config.commands;
        let env = commands.env.clone();
        Self {
            compiler: Arc::new(CommandCompiler::new(commands.compile.clone()).with_env(env.clone())),
            formatter: Arc::new(
                CommandChecker::new(Stage::Formatting, commands.format.clone()).with_env(env.clone()),
            ),
            spelling: Arc::new(
                CommandChecker::new(Stage::Spelling, commands.spelling.clone()).with_env(env.clone()),
            ),
            linter: Arc::new(
                CommandChecker::new(Stage::Linting, commands.lint.clone()).with_env(env.clone()),
            ),
            tests: Arc::new(
                CommandTestRunner::new(commands.test.clone(), config.test_selector())
                    .with_env(env.clone()),
            ),
            packages: Arc::new(CommandPackageManager::new(commands.install.clone()).with_env(env.clone())),
            toolchain: Arc::new(CommandToolchain::new(config.toolchain.command.clone()).with_env(env)),
        }
    }

    /// Returns the checker for a per-file verification stage.
    #[must_use]
    pub fn checker(&self, stage: Stage) -> Option<&Arc<dyn Checker>> {
        match stage {
            Stage::Formatting => Some(&self.formatter),
            Stage::Spelling => Some(&self.spelling),
            Stage::Linting => Some(&self.linter),
            Stage::Tests | Stage::Install => None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_report() {
        let ok = CompileReport::succeeded(vec![PathBuf::from("a.ts")], vec![PathBuf::from("a.js")]);
        assert!(ok.is_success());
        assert!(!CompileReport::failed(vec![]).is_success());
    }

    #[test]
    fn test_checker_lookup() {
        let collaborators = Collaborators::from_config(&StagewatchConfig::default());
        assert!(collaborators.checker(Stage::Linting).is_some());
        assert!(collaborators.checker(Stage::Tests).is_none());
        assert!(collaborators.checker(Stage::Install).is_none());
    }
}
