//! In-memory collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::collaborators::{
    Checker, Collaborators, CompileReport, Compiler, PackageManager, TestRunner, Toolchain,
};
use crate::errors::{Result, StagewatchError};
use crate::reporter::{Location, Reporter};

/// A compiler returning a configurable report.
#[derive(Debug)]
pub struct StubCompiler {
    report: Mutex<CompileReport>,
    error: Mutex<Option<StagewatchError>>,
    call_count: AtomicUsize,
}

impl Default for StubCompiler {
    fn default() -> Self {
        Self {
            report: Mutex::new(CompileReport::succeeded(Vec::new(), Vec::new())),
            error: Mutex::new(None),
            call_count: AtomicUsize::new(0),
        }
    }
}

impl StubCompiler {
    /// Creates a compiler reporting an empty, successful compilation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the report to return.
    pub fn set_report(&self, report: CompileReport) {
        *self.report.lock() = report;
    }

    /// Makes the next call fail with `error`.
    pub fn fail_with(&self, error: StagewatchError) {
        *self.error.lock() = Some(error);
    }

    /// Returns the number of times the compiler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compiler for StubCompiler {
    async fn compile(&self, _root: &Path, _reporter: &dyn Reporter) -> Result<CompileReport> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }
        Ok(self.report.lock().clone())
    }
}

/// A checker that records the files it was given.
#[derive(Debug)]
pub struct RecordingChecker {
    name: String,
    passes: Mutex<bool>,
    cancel_on_check: Mutex<bool>,
    calls: Mutex<Vec<Vec<PathBuf>>>,
    invalidations: AtomicUsize,
}

impl RecordingChecker {
    /// Creates a passing checker.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Mutex::new(true),
            cancel_on_check: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// Sets whether checks pass.
    pub fn set_passes(&self, passes: bool) {
        *self.passes.lock() = passes;
    }

    /// Makes the next checks cancel the pass they run in, as a newer
    /// change would.
    pub fn cancel_pass_on_check(&self) {
        *self.cancel_on_check.lock() = true;
    }

    /// Returns the file sets of every call.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().clone()
    }

    /// Returns the files of the most recent call.
    #[must_use]
    pub fn last_call(&self) -> Option<Vec<PathBuf>> {
        self.calls.lock().last().cloned()
    }

    /// Returns the number of times the checker was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns how often the cache was invalidated.
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Checker for RecordingChecker {
    async fn check(
        &self,
        _root: &Path,
        files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        self.calls.lock().push(files.to_vec());
        if *self.cancel_on_check.lock() {
            token.cancel("newer change");
        }
        let passes = *self.passes.lock();
        if !passes {
            for file in files {
                reporter.error(&format!("{} problem", self.name), Some(&Location::file(file)));
            }
        }
        Ok(passes)
    }

    fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// One recorded test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// Emitted test files offered to the runner.
    pub test_files: Vec<PathBuf>,
    /// Changed source files.
    pub changed_files: Vec<PathBuf>,
}

/// A test runner that records its runs.
#[derive(Debug)]
pub struct RecordingTestRunner {
    passes: Mutex<bool>,
    runs: Mutex<Vec<TestRun>>,
}

impl Default for RecordingTestRunner {
    fn default() -> Self {
        Self {
            passes: Mutex::new(true),
            runs: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingTestRunner {
    /// Creates a passing runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether runs pass.
    pub fn set_passes(&self, passes: bool) {
        *self.passes.lock() = passes;
    }

    /// Returns every recorded run.
    #[must_use]
    pub fn runs(&self) -> Vec<TestRun> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl TestRunner for RecordingTestRunner {
    async fn run_tests(
        &self,
        _root: &Path,
        test_files: &[PathBuf],
        changed_files: &[PathBuf],
        _reporter: &dyn Reporter,
        _token: &CancellationToken,
    ) -> Result<bool> {
        self.runs.lock().push(TestRun {
            test_files: test_files.to_vec(),
            changed_files: changed_files.to_vec(),
        });
        Ok(*self.passes.lock())
    }
}

/// A package manager that counts installs.
#[derive(Debug)]
pub struct StubPackageManager {
    succeeds: Mutex<bool>,
    installs: AtomicUsize,
}

impl Default for StubPackageManager {
    fn default() -> Self {
        Self {
            succeeds: Mutex::new(true),
            installs: AtomicUsize::new(0),
        }
    }
}

impl StubPackageManager {
    /// Creates a package manager whose installs succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether installs succeed.
    pub fn set_succeeds(&self, succeeds: bool) {
        *self.succeeds.lock() = succeeds;
    }

    /// Returns the number of installs.
    #[must_use]
    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageManager for StubPackageManager {
    async fn install(
        &self,
        _root: &Path,
        _reporter: &dyn Reporter,
        _token: &CancellationToken,
    ) -> Result<bool> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(*self.succeeds.lock())
    }
}

/// A toolchain probe with a fixed answer.
#[derive(Debug, Default)]
pub struct StubToolchain {
    version: Option<String>,
}

impl StubToolchain {
    /// Creates a probe reporting `version`.
    #[must_use]
    pub fn new(version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
        }
    }
}

#[async_trait]
impl Toolchain for StubToolchain {
    async fn version(&self) -> Result<Option<String>> {
        Ok(self.version.clone())
    }
}

/// Every collaborator as an inspectable double.
#[derive(Debug, Clone)]
pub struct MockCollaborators {
    /// Compiler.
    pub compiler: Arc<StubCompiler>,
    /// Style checker.
    pub formatter: Arc<RecordingChecker>,
    /// Spell checker.
    pub spelling: Arc<RecordingChecker>,
    /// Linter.
    pub linter: Arc<RecordingChecker>,
    /// Test runner.
    pub tests: Arc<RecordingTestRunner>,
    /// Package manager.
    pub packages: Arc<StubPackageManager>,
    /// Toolchain probe.
    pub toolchain: Arc<StubToolchain>,
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self {
            compiler: Arc::new(StubCompiler::new()),
            formatter: Arc::new(RecordingChecker::new("formatting")),
            spelling: Arc::new(RecordingChecker::new("spelling")),
            linter: Arc::new(RecordingChecker::new("linting")),
            tests: Arc::new(RecordingTestRunner::new()),
            packages: Arc::new(StubPackageManager::new()),
            toolchain: Arc::new(StubToolchain::new(Some("20.11.0"))),
        }
    }
}

impl MockCollaborators {
    /// Creates passing doubles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the doubles as pipeline collaborators.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            compiler: self.compiler.clone(),
            formatter: self.formatter.clone(),
            spelling: self.spelling.clone(),
            linter: self.linter.clone(),
            tests: self.tests.clone(),
            packages: self.packages.clone(),
            toolchain: self.toolchain.clone(),
        }
    }

    /// Resets call tracking on every checker.
    pub fn reset(&self) {
        self.formatter.reset();
        self.spelling.reset();
        self.linter.reset();
    }
}
