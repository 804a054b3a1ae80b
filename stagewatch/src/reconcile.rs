//! Reconciliation of generated output files.
//!
//! When a source file is renamed or removed its generated artifacts would
//! otherwise linger and be presumed valid. Every recorded output that the
//! newest compile no longer reports is deleted.

use crate::errors::{is_not_found, Result, StagewatchError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Stale outputs that were deleted (or already gone).
    pub removed: Vec<PathBuf>,
    /// The output set to record from now on.
    pub current: BTreeSet<PathBuf>,
}

/// Deletes every path in `previous` absent from `current`.
///
/// `current` is `None` when the compile failed; the recorded set then
/// becomes empty, so nothing from a failed compile is presumed valid. A file
/// that is already gone counts as deleted; any other deletion failure is
/// returned.
pub async fn reconcile(
    root: &Path,
    previous: &BTreeSet<PathBuf>,
    current: Option<&[PathBuf]>,
) -> Result<ReconcileReport> {
    let current: BTreeSet<PathBuf> = current.unwrap_or_default().iter().cloned().collect();
    let mut removed = Vec::new();

    for stale in previous.difference(&current) {
        let full = root.join(stale);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => debug!(path = %stale.display(), "Removed stale output"),
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(StagewatchError::at_path(&full, e)),
        }
        removed.push(stale.clone());
    }

    if !removed.is_empty() {
        info!(count = removed.len(), "Removed outputs of renamed or deleted sources");
    }
    Ok(ReconcileReport { removed, current })
}
