//! Command-backed collaborators.
//!
//! Each collaborator runs a configured argument vector in the project root.
//! An empty vector means the tool isn't configured and its stage passes.

use super::process::{run_command, CommandOutput};
use super::{Checker, CompileReport, Compiler, PackageManager, TestRunner, Toolchain};
use crate::cancellation::{CancellationToken, CleanupGuard};
use crate::core::Stage;
use crate::errors::{Result, StagewatchError};
use crate::reporter::{Location, Reporter};
use crate::source::TestSelector;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

type Env = BTreeMap<String, String>;

fn report_lines(output: &CommandOutput, reporter: &dyn Reporter) {
    for line in output.lines() {
        reporter.error(line, None);
    }
}

fn relative_to(root: &Path, path: PathBuf) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path,
    }
}

/// JSON printed by the compile command.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerManifest {
    #[serde(default)]
    source_files: Vec<PathBuf>,
    #[serde(default)]
    output_files: Option<Vec<PathBuf>>,
}

/// Compiler that runs a command printing a [`CompileReport`] as JSON.
///
/// The command writes `{"sourceFiles": [...], "outputFiles": [...]}` to
/// stdout and diagnostics to stderr. A non-zero exit or a null
/// `outputFiles` is a failed compile.
#[derive(Debug, Clone, Default)]
pub struct CommandCompiler {
    argv: Vec<String>,
    env: Env,
}

impl CommandCompiler {
    /// Creates a compiler running `argv`.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Env::new(),
        }
    }

    /// Sets extra environment variables.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, root: &Path, reporter: &dyn Reporter) -> Result<CompileReport> {
        if self.argv.is_empty() {
            return Ok(CompileReport::succeeded(Vec::new(), Vec::new()));
        }

        let token = CancellationToken::new();
        let Some(output) =
            run_command("compiler", &self.argv, std::iter::empty::<&str>(), root, &self.env, &token).await?
        else {
            return Ok(CompileReport::failed(Vec::new()));
        };

        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            reporter.error(line, None);
        }

        let manifest: CompilerManifest = match serde_json::from_str(output.stdout.trim()) {
            Ok(manifest) => manifest,
            Err(e) if output.success => {
                return Err(StagewatchError::collaborator(
                    "compiler",
                    format!("unreadable compile report: {e}"),
                ));
            }
            Err(_) => {
                for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
                    reporter.error(line, None);
                }
                return Ok(CompileReport::failed(Vec::new()));
            }
        };

        let source_files = manifest
            .source_files
            .into_iter()
            .map(|p| relative_to(root, p))
            .collect();
        let output_files = manifest
            .output_files
            .filter(|_| output.success)
            .map(|files| files.into_iter().map(|p| relative_to(root, p)).collect());

        Ok(CompileReport {
            source_files,
            output_files,
        })
    }
}

/// Style checker, spell checker or linter backed by a command.
///
/// The files to check are appended to the argument vector; every line the
/// tool prints on failure is reported as a problem.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    stage: Stage,
    argv: Vec<String>,
    env: Env,
}

impl CommandChecker {
    /// Creates a checker for `stage` running `argv`.
    #[must_use]
    pub fn new(stage: Stage, argv: Vec<String>) -> Self {
        Self {
            stage,
            argv,
            env: Env::new(),
        }
    }

    /// Sets extra environment variables.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl Checker for CommandChecker {
    async fn check(
        &self,
        root: &Path,
        files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        if self.argv.is_empty() || files.is_empty() {
            return Ok(true);
        }

        let name = self.stage.as_str();
        let Some(output) = run_command(name, &self.argv, files, root, &self.env, token).await? else {
            return Ok(false);
        };
        if !output.success {
            report_lines(&output, reporter);
        }
        Ok(output.success)
    }
}

/// Test runner backed by a command.
///
/// Holds at most one child: a new run terminates the previous one and
/// waits for it to go away before spawning.
#[derive(Debug)]
pub struct CommandTestRunner {
    argv: Vec<String>,
    env: Env,
    selector: TestSelector,
    current: Arc<Mutex<Option<Arc<CancellationToken>>>>,
    running: tokio::sync::Mutex<()>,
}

impl CommandTestRunner {
    /// Creates a runner for `argv`, picking tests with `selector`.
    #[must_use]
    pub fn new(argv: Vec<String>, selector: TestSelector) -> Self {
        Self {
            argv,
            env: Env::new(),
            selector,
            current: Arc::new(Mutex::new(None)),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Sets extra environment variables, e.g. for a sub-project under test.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run_tests(
        &self,
        root: &Path,
        test_files: &[PathBuf],
        changed_files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        let selected = self.selector.select(test_files, changed_files);
        let nothing_to_run = self.argv.is_empty() || selected.is_empty();

        // A new request always ends the previous run, even when it runs nothing.
        let run = Arc::new(CancellationToken::new());
        let previous = {
            let mut current = self.current.lock();
            if nothing_to_run {
                current.take()
            } else {
                current.replace(Arc::clone(&run))
            }
        };
        if let Some(previous) = previous {
            previous.cancel("superseded by a newer test run");
        }
        if nothing_to_run {
            debug!(available = test_files.len(), "No tests to run");
            return Ok(true);
        }
        let _running = self.running.lock().await;
        if run.is_cancelled() || token.is_cancelled() {
            return Ok(false);
        }

        let slot = Arc::clone(&self.current);
        let mine = Arc::clone(&run);
        let _release = CleanupGuard::new(move || {
            let mut current = slot.lock();
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &mine)) {
                *current = None;
            }
        });
        let forward = Arc::clone(&run);
        token.on_cancel(move || forward.cancel("pass cancelled"));

        info!(count = selected.len(), "Running tests");
        let Some(output) = run_command("tests", &self.argv, &selected, root, &self.env, &run).await? else {
            return Ok(false);
        };

        if output.success {
            reporter.status(&format!("{} test file(s) passed", selected.len()));
        } else {
            report_lines(&output, reporter);
        }
        Ok(output.success)
    }
}

/// Package manager backed by an install command.
#[derive(Debug, Clone, Default)]
pub struct CommandPackageManager {
    argv: Vec<String>,
    env: Env,
}

impl CommandPackageManager {
    /// Creates a package manager running `argv`.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Env::new(),
        }
    }

    /// Sets extra environment variables.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl PackageManager for CommandPackageManager {
    async fn install(
        &self,
        root: &Path,
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        if self.argv.is_empty() {
            return Ok(true);
        }

        reporter.status("Installing dependencies...");
        let Some(output) =
            run_command("install", &self.argv, std::iter::empty::<&str>(), root, &self.env, token).await?
        else {
            return Ok(false);
        };
        if !output.success {
            reporter.fatal(
                "Dependency install failed",
                output.stderr.trim(),
                Some(&Location::file(self.argv.join(" "))),
            );
        }
        Ok(output.success)
    }
}

/// Toolchain probe backed by a version command.
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    argv: Vec<String>,
    env: Env,
}

impl CommandToolchain {
    /// Creates a probe running `argv`.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Env::new(),
        }
    }

    /// Sets extra environment variables.
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn version(&self) -> Result<Option<String>> {
        if self.argv.is_empty() {
            return Ok(None);
        }
        let root = std::env::current_dir()?;
        let token = CancellationToken::new();
        let output =
            run_command("toolchain", &self.argv, std::iter::empty::<&str>(), &root, &self.env, &token).await?;

        Ok(output
            .filter(|o| o.success)
            .and_then(|o| o.stdout.lines().next().map(|l| l.trim().to_string()))
            .filter(|v| !v.is_empty()))
    }
}
