//! The persisted watermark record.

use crate::core::Stage;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Per-stage watermarks as seen at the start of a pass.
pub type StageSnapshot = BTreeMap<Stage, Timestamp>;

/// The record kept in the state file.
///
/// ```json
/// { "outputs": ["lib/a.js"], "stages": { "linting": "2024-05-01T10:00:00.000Z" } }
/// ```
///
/// A stage absent from `stages` has never succeeded or was invalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    /// Generated files reported by the last compile.
    #[serde(default)]
    pub outputs: BTreeSet<PathBuf>,
    /// Last success of each stage.
    #[serde(default)]
    pub stages: StageSnapshot,
}

impl WatermarkRecord {
    /// Creates an empty record, as for a fresh checkout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the oldest stage watermark, if any stage has one.
    #[must_use]
    pub fn oldest_watermark(&self) -> Option<Timestamp> {
        self.stages.values().min().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_is_empty_record() {
        let record: WatermarkRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, WatermarkRecord::new());
    }

    #[test]
    fn test_reads_persisted_shape() {
        let json = r#"{
            "outputs": ["lib/b.js", "lib/a.js"],
            "stages": { "linting": "2024-05-01T10:00:00.000Z", "tests": "2024-05-01T11:00:00Z" }
        }"#;
        let record: WatermarkRecord = serde_json::from_str(json).unwrap();

        assert_eq!(
            record.outputs.iter().collect::<Vec<_>>(),
            vec![&PathBuf::from("lib/a.js"), &PathBuf::from("lib/b.js")]
        );
        assert_eq!(
            record.stages.get(&Stage::Linting),
            Some(&Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            record.oldest_watermark(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_oldest_watermark_empty() {
        assert_eq!(WatermarkRecord::new().oldest_watermark(), None);
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let json = r#"{ "outputs": [], "stages": { "compiling": "2024-05-01T10:00:00Z" } }"#;
        assert!(serde_json::from_str::<WatermarkRecord>(json).is_err());
    }
}
