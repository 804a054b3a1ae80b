//! The verification stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A stage whose completion is independently watermarked.
///
/// The set is closed: four verification stages plus the `install`
/// bookkeeping pseudo-stage advanced by the dependency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Style checking.
    Formatting,
    /// Spell checking.
    Spelling,
    /// Lint checking.
    Linting,
    /// Test execution.
    Tests,
    /// Dependency installation.
    Install,
}

impl Stage {
    /// The four verification stages run by every post-compile pass.
    pub const VERIFICATION: [Self; 4] = [Self::Formatting, Self::Spelling, Self::Linting, Self::Tests];

    /// Returns the persisted name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Formatting => "formatting",
            Self::Spelling => "spelling",
            Self::Linting => "linting",
            Self::Tests => "tests",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, Error)]
#[error("Unknown stage: {0}")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formatting" => Ok(Self::Formatting),
            "spelling" => Ok(Self::Spelling),
            "linting" => Ok(Self::Linting),
            "tests" => Ok(Self::Tests),
            "install" => Ok(Self::Install),
            other => Err(ParseStageError(other.to_string())),
        }
    }
}
