//! Toolchain version requirement.

use super::Toolchain;
use crate::reporter::Reporter;
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, warn};

/// A minimum version such as `>=20.11`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    minimum: Vec<u64>,
    raw: String,
}

impl VersionRequirement {
    /// Parses `>=X.Y.Z`. A bare version is read as a minimum too.
    #[must_use]
    pub fn parse(requirement: &str) -> Option<Self> {
        let raw = requirement.trim();
        let version = raw.strip_prefix(">=").unwrap_or(raw).trim();
        let minimum = parse_version(version)?;
        Some(Self {
            minimum,
            raw: raw.to_string(),
        })
    }

    /// Returns true if `version` meets the requirement.
    #[must_use]
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        parse_version(version).is_some_and(|actual| compare(&actual, &self.minimum) != Ordering::Less)
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    let version = version.trim().trim_start_matches('v');
    // Pre-release and build suffixes don't take part in the comparison.
    let core = version.split(['-', '+']).next()?;
    if core.is_empty() {
        return None;
    }
    core.split('.').map(|part| part.parse().ok()).collect()
}

fn compare(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ordering = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Checks the running toolchain against `minimum`.
///
/// Only reports: an unavailable probe or an old toolchain is shown to the
/// user and logged, and the pass continues either way. Returns whether the
/// requirement is known to be met.
pub async fn check_toolchain(
    toolchain: &dyn Toolchain,
    minimum: Option<&str>,
    reporter: &dyn Reporter,
) -> bool {
    let Some(requirement) = minimum else {
        return true;
    };
    let Some(requirement) = VersionRequirement::parse(requirement) else {
        warn!(requirement, "Unparseable toolchain requirement");
        return true;
    };

    match toolchain.version().await {
        Ok(Some(version)) if requirement.is_satisfied_by(&version) => {
            debug!(%version, %requirement, "Toolchain is compatible");
            true
        }
        Ok(Some(version)) => {
            warn!(%version, %requirement, "Toolchain is too old");
            reporter.error(
                &format!("Toolchain {version} doesn't satisfy {requirement}"),
                None,
            );
            false
        }
        Ok(None) => {
            warn!(%requirement, "Toolchain version unavailable");
            reporter.error(
                &format!("Couldn't determine the toolchain version (need {requirement})"),
                None,
            );
            false
        }
        Err(e) => {
            warn!(error = %e, "Toolchain probe failed");
            reporter.error(&format!("Toolchain probe failed: {e}"), None);
            false
        }
    }
}
