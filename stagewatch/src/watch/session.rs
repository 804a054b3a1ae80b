//! The watch loop.

use super::classify::{Action, ChangeClassifier};
use super::coordinator::Coordinator;
use crate::cancellation::CancellationToken;
use crate::core::Stage;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::reporter::{Reporter, SignaledReporter};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 256;

/// Re-verifies a project whenever its files change.
///
/// File-system events are debounced into batches; each batch that matters
/// starts a pass on its own task and supersedes the pass before it. Passes
/// take turns on the pipeline, so the watermark record is only ever
/// touched by one of them.
///
/// Dependencies are checked on the first pass and after every manifest
/// change; a failed install fails every pass until the next one.
pub struct WatchSession {
    pipeline: Arc<Mutex<Pipeline>>,
    prepared: Arc<parking_lot::Mutex<Option<bool>>>,
    pending: Arc<PendingChanges>,
    coordinator: Arc<Coordinator>,
    reporter: Arc<dyn Reporter>,
    classifier: ChangeClassifier,
    outputs: Arc<RwLock<BTreeSet<PathBuf>>>,
    debounce: Duration,
    root: PathBuf,
}

impl WatchSession {
    /// Creates a session over `pipeline`, reporting through `reporter`.
    #[must_use]
    pub fn new(pipeline: Pipeline, reporter: Arc<dyn Reporter>) -> Self {
        let classifier = ChangeClassifier::for_pipeline(&pipeline);
        let outputs = pipeline.store().outputs().clone();
        let debounce = pipeline.config().debounce();
        let root = pipeline.root().to_path_buf();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            prepared: Arc::new(parking_lot::Mutex::new(None)),
            pending: Arc::new(PendingChanges::default()),
            coordinator: Arc::new(Coordinator::new()),
            reporter,
            classifier,
            outputs: Arc::new(RwLock::new(outputs)),
            debounce,
            root,
        }
    }

    /// Overrides the debounce window.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Returns the pass coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Watches until `shutdown` completes.
    ///
    /// Runs one pass straight away, then one per relevant batch of changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher can't be set up.
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = %self.root.display(), debounce = ?self.debounce, "Watching");

        self.trigger(Action::Pass);

        tokio::pin!(shutdown);
        loop {
            let first = tokio::select! {
                () = &mut shutdown => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let mut changed = Vec::new();
            collect(first, &mut changed);
            // Keep gathering until the tree has been quiet for a whole window.
            while let Ok(Some(event)) = tokio::time::timeout(self.debounce, rx.recv()).await {
                collect(event, &mut changed);
            }

            let action = {
                let outputs = self.outputs.read();
                self.classifier.classify_all(&changed, &outputs)
            };
            match action {
                Some(action) => {
                    debug!(?action, paths = changed.len(), "Change detected");
                    self.trigger(action);
                }
                None => debug!(paths = changed.len(), "Ignoring changes"),
            }
        }

        info!("Stopping");
        self.coordinator.cancel_current("shutting down");
        drop(watcher);
        Ok(())
    }

    /// Starts a pass for `action`, superseding the running one.
    pub fn trigger(&self, action: Action) -> JoinHandle<()> {
        // Recorded outside the pass in case a newer change supersedes it.
        self.pending.record(action);
        let token = self.coordinator.begin_pass();
        let reporter = SignaledReporter::new(Arc::clone(&self.reporter), Arc::clone(&token));
        let pipeline = Arc::clone(&self.pipeline);
        let coordinator = Arc::clone(&self.coordinator);
        let outputs = Arc::clone(&self.outputs);
        let prepared = Arc::clone(&self.prepared);
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            let mut pipeline = pipeline.lock().await;
            if token.is_cancelled() {
                debug!(?action, "Superseded before starting");
                coordinator.finish(&token);
                return;
            }

            if pending.dictionary.swap(false, Ordering::SeqCst) {
                if let Err(e) = pipeline.invalidate(Stage::Spelling) {
                    warn!(error = %e, "Could not save spelling invalidation");
                }
            }
            let action = if pending.manifests.swap(false, Ordering::SeqCst) {
                Action::Restart
            } else {
                action
            };
            let result = execute(&mut pipeline, &prepared, action, &reporter, &token).await;
            *outputs.write() = pipeline.store().outputs().clone();
            drop(pipeline);

            match result {
                Ok(passed) => info!(?action, passed, cancelled = token.is_cancelled(), "Pass done"),
                Err(e) => {
                    error!(?action, error = %e, "Pass failed");
                    reporter.fatal("Pass failed", &e.to_string(), None);
                }
            }
            coordinator.finish(&token);
        })
    }
}

/// Changes that must reach the next pass that actually runs.
#[derive(Debug, Default)]
struct PendingChanges {
    dictionary: AtomicBool,
    manifests: AtomicBool,
}

impl PendingChanges {
    fn record(&self, action: Action) {
        match action {
            Action::Spelling => self.dictionary.store(true, Ordering::SeqCst),
            Action::Restart => self.manifests.store(true, Ordering::SeqCst),
            Action::Pass => {}
        }
    }
}

async fn execute(
    pipeline: &mut Pipeline,
    prepared: &parking_lot::Mutex<Option<bool>>,
    action: Action,
    reporter: &dyn Reporter,
    token: &CancellationToken,
) -> Result<bool> {
    if action == Action::Restart {
        info!("Dependencies changed, restarting");
        pipeline.clear_stages()?;
        *prepared.lock() = None;
    }

    let known = *prepared.lock();
    let ready = match known {
        Some(ready) => ready,
        None => {
            let ready = pipeline.pre_compile(reporter, token).await?;
            // A cancelled check proves nothing; the next pass repeats it.
            if !token.is_cancelled() {
                *prepared.lock() = Some(ready);
            }
            ready
        }
    };
    if !ready {
        if !token.is_cancelled() {
            Pipeline::report_verdict(reporter, false);
        }
        return Ok(false);
    }

    let files = pipeline.last_sources().to_vec();
    if action == Action::Spelling && !files.is_empty() {
        return pipeline.recheck_spelling(&files, reporter, token).await;
    }
    // Nothing compiled yet means no source set to recheck, so spelling falls back to a pass.
    pipeline.run_stages(reporter, token).await
}

fn collect(event: notify::Result<Event>, changed: &mut Vec<PathBuf>) {
    match event {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for path in event.paths {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        Err(e) => warn!(error = %e, "Watch error"),
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("root", &self.root)
            .field("debounce", &self.debounce)
            .field("running", &self.coordinator.is_running())
            .finish_non_exhaustive()
    }
}
