//! Core domain types.
//!
//! This module contains the fixed set of verification stages whose
//! completion is independently watermarked.

mod stage;

pub use stage::{ParseStageError, Stage};
