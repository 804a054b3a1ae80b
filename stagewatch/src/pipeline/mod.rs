//! Pipeline orchestration.
//!
//! This module provides:
//! - Pipeline, the two-phase pass over the verification stages
//! - PipelineBuilder for assembling one from a project root

mod builder;
mod integration_tests;
mod orchestrator;

pub use builder::PipelineBuilder;
pub use orchestrator::Pipeline;
