//! Loading, mutating and saving the watermark record.

use super::{StageSnapshot, WatermarkRecord};
use crate::core::Stage;
use crate::errors::{is_not_found, Result, StagewatchError};
use crate::utils::{next_stamp, Timestamp};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Owner of the watermark record for one project root.
///
/// The store is loaded once per run, threaded through the pipeline by
/// `&mut` and flushed after every pass.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
    record: WatermarkRecord,
}

impl WatermarkStore {
    /// Default state file name, relative to the project root.
    pub const DEFAULT_FILE_NAME: &'static str = ".timestamps.json";

    /// Loads the default state file under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from(root.join(Self::DEFAULT_FILE_NAME))
    }

    /// Loads the record at `path`.
    ///
    /// A missing file yields an empty record. Any other read failure, and
    /// any decoding failure, is returned.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let record = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                StagewatchError::StateFile {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if is_not_found(&e) => {
                debug!(path = %path.display(), "No state file, starting fresh");
                WatermarkRecord::new()
            }
            Err(e) => return Err(StagewatchError::at_path(&path, e)),
        };
        Ok(Self { path, record })
    }

    /// Creates a store over an in-memory record without touching disk.
    #[must_use]
    pub fn with_record(path: impl Into<PathBuf>, record: WatermarkRecord) -> Self {
        Self {
            path: path.into(),
            record,
        }
    }

    /// Writes the record back.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the state file, so a crash leaves either the old or
    /// the new content.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let content = serde_json::to_string_pretty(&self.record).map_err(|source| {
            StagewatchError::StateFile {
                path: self.path.clone(),
                source,
            }
        })?;

        let prefix = self
            .path
            .file_name()
            .map_or_else(|| ".stagewatch.".to_string(), temp_prefix);
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StagewatchError::at_path(dir, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StagewatchError::at_path(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StagewatchError::at_path(&self.path, e.error))?;

        debug!(path = %self.path.display(), "Saved watermarks");
        Ok(())
    }

    /// Returns true if `candidate` is `state_file` or a temporary file
    /// written next to it while saving.
    #[must_use]
    pub fn is_state_path(state_file: &Path, candidate: &Path) -> bool {
        if candidate == state_file {
            return true;
        }
        let (Some(name), Some(candidate_name)) = (state_file.file_name(), candidate.file_name())
        else {
            return false;
        };
        candidate.parent() == state_file.parent()
            && candidate_name.to_string_lossy().starts_with(&temp_prefix(name))
    }

    /// Returns the state file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the in-memory record.
    #[must_use]
    pub fn record(&self) -> &WatermarkRecord {
        &self.record
    }

    /// Returns the watermark of `stage`.
    #[must_use]
    pub fn watermark(&self, stage: Stage) -> Option<Timestamp> {
        self.record.stages.get(&stage).copied()
    }

    /// Returns the oldest stage watermark.
    #[must_use]
    pub fn oldest_watermark(&self) -> Option<Timestamp> {
        self.record.oldest_watermark()
    }

    /// Copies the stage map, giving a pass its pre-pass view.
    #[must_use]
    pub fn snapshot(&self) -> StageSnapshot {
        self.record.stages.clone()
    }

    /// Stamps `stage` as completed now and returns the stamp.
    pub fn stage_complete(&mut self, stage: Stage) -> Timestamp {
        let stamp = next_stamp(self.watermark(stage));
        self.record.stages.insert(stage, stamp);
        info!(%stage, stamp = %crate::utils::format_iso8601(&stamp), "Stage complete");
        stamp
    }

    /// Moves the watermark of `stage` to `stamp` if that is later.
    ///
    /// Returns whether the watermark changed.
    pub fn advance(&mut self, stage: Stage, stamp: Timestamp) -> bool {
        match self.watermark(stage) {
            Some(current) if current >= stamp => false,
            _ => {
                self.record.stages.insert(stage, stamp);
                true
            }
        }
    }

    /// Forgets the watermark of `stage`, so its next run sees every candidate.
    ///
    /// Returns whether there was one.
    pub fn invalidate(&mut self, stage: Stage) -> bool {
        let removed = self.record.stages.remove(&stage).is_some();
        if removed {
            info!(%stage, "Invalidated watermark");
        }
        removed
    }

    /// Forgets every stage watermark.
    pub fn clear_stages(&mut self) {
        info!("Clearing stage watermarks");
        self.record.stages.clear();
    }

    /// Returns the recorded output set.
    #[must_use]
    pub fn outputs(&self) -> &BTreeSet<PathBuf> {
        &self.record.outputs
    }

    /// Replaces the recorded output set.
    pub fn replace_outputs(&mut self, outputs: BTreeSet<PathBuf>) {
        self.record.outputs = outputs;
    }
}

fn temp_prefix(state_name: &std::ffi::OsStr) -> String {
    format!("{}.", state_name.to_string_lossy())
}
