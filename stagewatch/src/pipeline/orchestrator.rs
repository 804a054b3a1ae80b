//! The two-phase verification pass.

use super::PipelineBuilder;
use crate::cancellation::CancellationToken;
use crate::collaborators::{check_toolchain, CompileReport, Collaborators};
use crate::config::StagewatchConfig;
use crate::core::Stage;
use crate::dependencies::DependencyGate;
use crate::errors::{Result, StagewatchError};
use crate::observability::SpanTimer;
use crate::reconcile::reconcile;
use crate::reporter::Reporter;
use crate::source::{SourceFilter, TestSelector};
use crate::staleness::{GateOutcome, StalenessGate};
use crate::utils::Timestamp;
use crate::watermark::{StageSnapshot, WatermarkStore};
use futures::FutureExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Drives the collaborators for one project and owns its watermarks.
///
/// A pass is `pre_compile`, then compilation, then `post_compile`. Gates
/// within a pass read the watermarks as they were when the pass began;
/// every stamp is applied, and the record saved, once the pass is over.
#[derive(Debug)]
pub struct Pipeline {
    root: PathBuf,
    config: StagewatchConfig,
    store: WatermarkStore,
    collaborators: Collaborators,
    sources: SourceFilter,
    selector: TestSelector,
    dependencies: DependencyGate,
    last_sources: Vec<PathBuf>,
}

impl Pipeline {
    /// Starts building a pipeline for the project at `root`.
    #[must_use]
    pub fn builder(root: impl Into<PathBuf>) -> PipelineBuilder {
        PipelineBuilder::new(root)
    }

    /// Assembles a pipeline from already-loaded parts.
    #[must_use]
    pub fn from_parts(
        root: PathBuf,
        config: StagewatchConfig,
        store: WatermarkStore,
        collaborators: Collaborators,
    ) -> Self {
        let sources = config.source_filter();
        let selector = config.test_selector();
        let dependencies = DependencyGate::new(&root, config.manifests.clone());
        Self {
            root,
            config,
            store,
            collaborators,
            sources,
            selector,
            dependencies,
            last_sources: Vec::new(),
        }
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StagewatchConfig {
        &self.config
    }

    /// Returns the watermark store.
    #[must_use]
    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    /// Returns the source filter.
    #[must_use]
    pub fn source_filter(&self) -> &SourceFilter {
        &self.sources
    }

    /// Returns the dependency gate.
    #[must_use]
    pub fn dependencies(&self) -> &DependencyGate {
        &self.dependencies
    }

    /// Source files seen by the most recent `post_compile`.
    #[must_use]
    pub fn last_sources(&self) -> &[PathBuf] {
        &self.last_sources
    }

    /// Stamps `stage` as completed now and saves.
    pub fn stage_complete(&mut self, stage: Stage) -> Result<Timestamp> {
        let stamp = self.store.stage_complete(stage);
        self.store.save()?;
        Ok(stamp)
    }

    /// Forgets the watermark of `stage` and saves.
    pub fn invalidate(&mut self, stage: Stage) -> Result<()> {
        if self.store.invalidate(stage) {
            self.store.save()?;
        }
        Ok(())
    }

    /// Reports the end of a pass: "All good" or "Issues found".
    pub fn report_verdict(reporter: &dyn Reporter, passed: bool) {
        report_verdict(reporter, passed);
    }

    /// Forgets every stage watermark and the linter's cache, and saves.
    pub fn clear_stages(&mut self) -> Result<()> {
        self.store.clear_stages();
        self.collaborators.linter.invalidate_cache();
        self.store.save()
    }

    /// Makes sure the dependency tree is current before anything is checked.
    ///
    /// Reinstalls when a manifest is newer than the oldest watermark (or
    /// nothing has been verified yet). A successful install invalidates
    /// every stage and stamps `install`. Returns false only when the
    /// install failed.
    pub async fn pre_compile(
        &mut self,
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        check_toolchain(
            self.collaborators.toolchain.as_ref(),
            self.config.toolchain.minimum.as_deref(),
            reporter,
        )
        .await;

        if !self.dependencies.should_install(self.store.oldest_watermark())? {
            debug!("Dependencies are current");
            return Ok(true);
        }

        info!("Dependencies changed, installing");
        let timer = SpanTimer::start("install");
        let installed = self.collaborators.packages.install(&self.root, reporter, token).await;
        let installed = match installed {
            Ok(installed) => installed,
            Err(e) => {
                self.store.save()?;
                return Err(e);
            }
        };
        info!(installed, duration_ms = timer.finish(), "Install finished");

        if installed && !token.is_cancelled() {
            self.store.clear_stages();
            self.collaborators.linter.invalidate_cache();
            self.store.stage_complete(Stage::Install);
        }
        self.store.save()?;
        Ok(installed)
    }

    /// Runs the four verification stages against one compilation.
    ///
    /// `input_files` are the compiler's inputs; `compile` resolves to the
    /// emitted files, or `None` when compilation failed. The gates run
    /// concurrently with it and only the test gate waits for it. The pass
    /// passes when compilation and all four stages do.
    ///
    /// Stamps, output reconciliation and the save happen whatever the
    /// outcome; an infrastructure error from a stage is returned after
    /// that.
    pub async fn post_compile<F>(
        &mut self,
        input_files: &[PathBuf],
        compile: F,
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool>
    where
        F: Future<Output = Option<Vec<PathBuf>>> + Send,
    {
        let timer = SpanTimer::start("post_compile");
        let sources = self.sources.select(input_files);
        let spelling = self.spelling_candidates(&sources).await?;
        self.last_sources.clone_from(&sources);

        let gate = StalenessGate::new(&self.root, self.store.snapshot());
        let (compiled, outcomes) = run_gates(
            &gate,
            GateInputs {
                root: &self.root,
                collaborators: &self.collaborators,
                selector: &self.selector,
                sources: &sources,
                spelling: &spelling,
            },
            compile,
            reporter,
            token,
        )
        .await;

        let mut passed = compiled.is_some();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => {
                    debug!(
                        stage = %outcome.stage,
                        passed = outcome.passed,
                        checked = outcome.checked,
                        "Stage finished"
                    );
                    passed &= outcome.passed;
                    if let Some(stamp) = outcome.stamp {
                        self.store.advance(outcome.stage, stamp);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Stage failed to run");
                    passed = false;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Err(e) = self.record_outputs(compiled.as_deref()).await {
            first_error.get_or_insert(e);
        }
        self.store.save()?;

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(passed, sources = sources.len(), duration_ms = timer.finish(), "Pass finished");
        if !token.is_cancelled() {
            report_verdict(reporter, passed);
        }
        Ok(passed)
    }

    /// One full pass: pre-compile, compile, post-compile.
    ///
    /// When the install fails no stage runs and the pass fails.
    pub async fn run_once(&mut self, reporter: &dyn Reporter, token: &CancellationToken) -> Result<bool> {
        if !self.pre_compile(reporter, token).await? {
            if !token.is_cancelled() {
                report_verdict(reporter, false);
            }
            return Ok(false);
        }
        self.run_stages(reporter, token).await
    }

    /// Compiles and runs the verification stages, skipping the dependency check.
    ///
    /// For callers that already ran [`pre_compile`](Self::pre_compile) and
    /// know it succeeded.
    pub async fn run_stages(&mut self, reporter: &dyn Reporter, token: &CancellationToken) -> Result<bool> {
        if token.is_cancelled() {
            return Ok(false);
        }

        let report = self.compile(reporter).await?;
        let outputs = report.output_files;
        self.post_compile(&report.source_files, async move { outputs }, reporter, token)
            .await
    }

    /// Compiles the project through the compiler collaborator.
    pub async fn compile(&self, reporter: &dyn Reporter) -> Result<CompileReport> {
        let timer = SpanTimer::start("compile");
        let report = self.collaborators.compiler.compile(&self.root, reporter).await?;
        info!(
            sources = report.source_files.len(),
            succeeded = report.is_success(),
            duration_ms = timer.finish(),
            "Compiled"
        );
        Ok(report)
    }

    /// Re-runs only spelling over every file in `files`.
    ///
    /// Used when the project dictionary changes: words it now accepts (or
    /// no longer accepts) may appear in files that haven't changed.
    pub async fn recheck_spelling(
        &mut self,
        files: &[PathBuf],
        reporter: &dyn Reporter,
        token: &CancellationToken,
    ) -> Result<bool> {
        let candidates = self.spelling_candidates(files).await?;
        // No watermark in the view, so every candidate is rechecked.
        let gate = StalenessGate::new(&self.root, StageSnapshot::new());
        let root = &self.root;
        let spelling = &self.collaborators.spelling;
        let outcome = gate
            .if_changed(Stage::Spelling, &candidates, token, |files| async move {
                spelling.check(root, &files, reporter, token).await
            })
            .await?;

        if outcome.stamp.is_some() {
            // Stamped through the store so it still moves past the current watermark.
            self.store.stage_complete(Stage::Spelling);
        }
        self.store.save()?;

        if !token.is_cancelled() {
            report_verdict(reporter, outcome.passed);
        }
        Ok(outcome.passed)
    }

    async fn spelling_candidates(&self, sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut candidates = sources.to_vec();
        for extra in &self.config.spelling_extras {
            let full = self.root.join(extra);
            let exists = tokio::fs::try_exists(&full)
                .await
                .map_err(|e| StagewatchError::at_path(&full, e))?;
            if exists && !candidates.contains(extra) {
                candidates.push(extra.clone());
            }
        }
        Ok(candidates)
    }

    async fn record_outputs(&mut self, current: Option<&[PathBuf]>) -> Result<()> {
        match reconcile(&self.root, self.store.outputs(), current).await {
            Ok(report) => {
                if !report.removed.is_empty() {
                    info!(removed = report.removed.len(), "Removed stale outputs");
                }
                self.store.replace_outputs(report.current);
                Ok(())
            }
            Err(e) => {
                // Keep the old entries so the next pass retries the deletion.
                let mut outputs = self.store.outputs().clone();
                outputs.extend(current.unwrap_or_default().iter().cloned());
                self.store.replace_outputs(outputs);
                Err(e)
            }
        }
    }
}

fn report_verdict(reporter: &dyn Reporter, passed: bool) {
    reporter.status(if passed { "All good" } else { "Issues found" });
    reporter.done();
}

struct GateInputs<'a> {
    root: &'a Path,
    collaborators: &'a Collaborators,
    selector: &'a TestSelector,
    sources: &'a [PathBuf],
    spelling: &'a [PathBuf],
}

async fn run_gates<F>(
    gate: &StalenessGate,
    inputs: GateInputs<'_>,
    compile: F,
    reporter: &dyn Reporter,
    token: &CancellationToken,
) -> (Option<Vec<PathBuf>>, [Result<GateOutcome>; 4])
where
    F: Future<Output = Option<Vec<PathBuf>>> + Send,
{
    let GateInputs {
        root,
        collaborators,
        selector,
        sources,
        spelling,
    } = inputs;
    let compile = compile.shared();

    let formatting = gate.if_changed(Stage::Formatting, sources, token, |files| async move {
        collaborators.formatter.check(root, &files, reporter, token).await
    });
    let spelling = gate.if_changed(Stage::Spelling, spelling, token, |files| async move {
        collaborators.spelling.check(root, &files, reporter, token).await
    });
    let linting = gate.if_changed(Stage::Linting, sources, token, |files| async move {
        collaborators.linter.check(root, &files, reporter, token).await
    });
    let compiled_for_tests = compile.clone();
    let tests = gate.if_changed(Stage::Tests, sources, token, move |changed| {
        let compile = compiled_for_tests;
        async move {
            let Some(outputs) = compile.await else {
                return Ok(false);
            };
            if token.is_cancelled() {
                return Ok(false);
            }
            let test_files = selector.test_artifacts(&outputs);
            collaborators
                .tests
                .run_tests(root, &test_files, &changed, reporter, token)
                .await
        }
    });

    let (compiled, formatting, spelling, linting, tests) =
        tokio::join!(compile, formatting, spelling, linting, tests);
    (compiled, [formatting, spelling, linting, tests])
}
