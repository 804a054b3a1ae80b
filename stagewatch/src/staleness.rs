//! The "has this stage gone stale" decision.
//!
//! A stage with no watermark sees every candidate. Otherwise only files
//! modified strictly after the watermark are handed to the stage; a file
//! that cannot be stat'ed because it is missing is always included, since
//! it cannot be confirmed clean.

use crate::cancellation::CancellationToken;
use crate::core::Stage;
use crate::errors::{is_not_found, Result, StagewatchError};
use crate::utils::timestamps::from_system_time;
use crate::utils::{next_stamp, Timestamp};
use crate::watermark::StageSnapshot;
use futures::future::try_join_all;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a gated stage run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    /// The gated stage.
    pub stage: Stage,
    /// Whether the stage passed.
    pub passed: bool,
    /// The new watermark, present only when the stage passed in a live pass.
    pub stamp: Option<Timestamp>,
    /// How many files the stage was given.
    pub checked: usize,
}

impl GateOutcome {
    /// An outcome for a stage that failed without running.
    #[must_use]
    pub fn failed(stage: Stage) -> Self {
        Self {
            stage,
            passed: false,
            stamp: None,
            checked: 0,
        }
    }
}

/// Narrows `candidates` to the files modified after `watermark`.
///
/// Paths are resolved against `root`. Order is preserved.
pub async fn narrow(
    root: &Path,
    watermark: Option<Timestamp>,
    candidates: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let Some(watermark) = watermark else {
        return Ok(candidates.to_vec());
    };

    let modified = try_join_all(candidates.iter().map(|candidate| async move {
        let full = root.join(candidate);
        match tokio::fs::metadata(&full).await {
            Ok(metadata) => metadata
                .modified()
                .map(|time| Some(from_system_time(time)))
                .map_err(|e| StagewatchError::at_path(&full, e)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(StagewatchError::at_path(&full, e)),
        }
    }))
    .await?;

    Ok(candidates
        .iter()
        .zip(modified)
        .filter(|(_, modified)| modified.map_or(true, |time| time > watermark))
        .map(|(candidate, _)| candidate.clone())
        .collect())
}

/// Stage gating against a fixed pre-pass view of the watermarks.
///
/// Gates evaluated concurrently within one pass all read the same snapshot,
/// so no gate observes another's result; new stamps are returned in the
/// [`GateOutcome`] and applied by the caller once the pass is done.
#[derive(Debug, Clone)]
pub struct StalenessGate {
    root: PathBuf,
    snapshot: StageSnapshot,
}

impl StalenessGate {
    /// Creates a gate over `snapshot`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, snapshot: StageSnapshot) -> Self {
        Self {
            root: root.into(),
            snapshot,
        }
    }

    /// Returns the pre-pass watermark of `stage`.
    #[must_use]
    pub fn watermark(&self, stage: Stage) -> Option<Timestamp> {
        self.snapshot.get(&stage).copied()
    }

    /// Runs `runner` over the candidates that changed since `stage` last passed.
    ///
    /// The runner is invoked even when nothing changed: an empty set is a
    /// valid, successful run. A stamp is produced only when the runner
    /// passes and `token` has not been cancelled in the meantime.
    pub async fn if_changed<F, Fut>(
        &self,
        stage: Stage,
        candidates: &[PathBuf],
        token: &CancellationToken,
        runner: F,
    ) -> Result<GateOutcome>
    where
        F: FnOnce(Vec<PathBuf>) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let watermark = self.watermark(stage);
        let narrowed = narrow(&self.root, watermark, candidates).await?;
        let checked = narrowed.len();
        debug!(%stage, candidates = candidates.len(), checked, "Narrowed candidates");

        let passed = runner(narrowed).await?;
        let stamp = (passed && !token.is_cancelled()).then(|| next_stamp(watermark));

        Ok(GateOutcome {
            stage,
            passed,
            stamp,
            checked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parking_lot::Mutex;
    use std::fs::File;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn touch(root: &Path, name: &str, modified: SystemTime) -> PathBuf {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
        PathBuf::from(name)
    }

    fn hours_ago(hours: u64) -> SystemTime {
        SystemTime::now() - std::time::Duration::from_secs(hours * 3600)
    }

    fn recording_runner(
        seen: Arc<Mutex<Option<Vec<PathBuf>>>>,
        result: bool,
    ) -> impl FnOnce(Vec<PathBuf>) -> std::future::Ready<Result<bool>> {
        move |files| {
            *seen.lock() = Some(files);
            std::future::ready(Ok(result))
        }
    }

    #[tokio::test]
    async fn test_no_watermark_passes_every_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<_> = (0..5)
            .map(|i| touch(dir.path(), &format!("src/f{i}.ts"), hours_ago(10)))
            .collect();
        let gate = StalenessGate::new(dir.path(), StageSnapshot::new());
        let seen = Arc::new(Mutex::new(None));

        let outcome = gate
            .if_changed(
                Stage::Linting,
                &files,
                &CancellationToken::new(),
                recording_runner(seen.clone(), true),
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().clone().unwrap(), files);
        assert!(outcome.passed);
        assert!(outcome.stamp.is_some());
        assert_eq!(outcome.checked, 5);
    }

    #[tokio::test]
    async fn test_only_files_newer_than_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "old.ts", hours_ago(5));
        let new = touch(dir.path(), "new.ts", SystemTime::now());
        let watermark = crate::utils::now_utc() - Duration::hours(1);

        let narrowed = narrow(dir.path(), Some(watermark), &[old, new.clone()])
            .await
            .unwrap();

        assert_eq!(narrowed, vec![new]);
    }

    #[tokio::test]
    async fn test_missing_file_is_always_stale() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = crate::utils::now_utc() + Duration::hours(1);

        let narrowed = narrow(dir.path(), Some(watermark), &[PathBuf::from("gone.ts")])
            .await
            .unwrap();

        assert_eq!(narrowed, vec![PathBuf::from("gone.ts")]);
    }

    #[tokio::test]
    async fn test_empty_narrowed_set_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "a.ts", hours_ago(3));
        let mut snapshot = StageSnapshot::new();
        snapshot.insert(Stage::Formatting, crate::utils::now_utc());
        let gate = StalenessGate::new(dir.path(), snapshot);
        let seen = Arc::new(Mutex::new(None));

        let outcome = gate
            .if_changed(
                Stage::Formatting,
                &[file],
                &CancellationToken::new(),
                recording_runner(seen.clone(), true),
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().clone(), Some(Vec::new()));
        assert!(outcome.passed);
        assert_eq!(outcome.checked, 0);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let gate = StalenessGate::new(dir.path(), StageSnapshot::new());

        let outcome = gate
            .if_changed(
                Stage::Spelling,
                &[],
                &CancellationToken::new(),
                recording_runner(Arc::new(Mutex::new(None)), false),
            )
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(outcome.stamp, None);
    }

    #[tokio::test]
    async fn test_stamp_is_later_than_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let previous = crate::utils::now_utc() + Duration::minutes(5);
        let mut snapshot = StageSnapshot::new();
        snapshot.insert(Stage::Tests, previous);
        let gate = StalenessGate::new(dir.path(), snapshot);

        let outcome = gate
            .if_changed(
                Stage::Tests,
                &[],
                &CancellationToken::new(),
                recording_runner(Arc::new(Mutex::new(None)), true),
            )
            .await
            .unwrap();

        assert!(outcome.stamp.unwrap() > previous);
    }

    #[tokio::test]
    async fn test_cancelled_pass_leaves_no_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let gate = StalenessGate::new(dir.path(), StageSnapshot::new());
        let token = CancellationToken::new();

        let outcome = gate
            .if_changed(Stage::Linting, &[], &token, |_| {
                token.cancel("newer change");
                std::future::ready(Ok(true))
            })
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.stamp, None);
    }

    #[tokio::test]
    async fn test_runner_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let gate = StalenessGate::new(dir.path(), StageSnapshot::new());

        let result = gate
            .if_changed(Stage::Linting, &[], &CancellationToken::new(), |_| {
                std::future::ready(Err(StagewatchError::collaborator("linter", "crashed")))
            })
            .await;

        assert!(result.is_err());
    }
}
