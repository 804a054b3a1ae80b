//! Testing utilities for stagewatch pipelines.
//!
//! This module provides:
//! - In-memory collaborators that record what they were asked to check
//! - Project fixtures with controlled modification times
//! - Watermark assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_all_stamped, assert_not_stamped, assert_persisted, assert_stamped};
pub use fixtures::ProjectFixture;
pub use mocks::{
    MockCollaborators, RecordingChecker, RecordingTestRunner, StubCompiler, StubPackageManager,
    StubToolchain, TestRun,
};
