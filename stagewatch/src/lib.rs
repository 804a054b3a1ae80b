//! # Stagewatch
//!
//! Incremental verification for a source tree.
//!
//! On every change, stagewatch decides which verification stages actually
//! need to run again, runs only those on only the files that changed, and
//! records the result so the next change does even less:
//!
//! - **Watermarks**: the time each stage last passed, persisted per project
//! - **Staleness gating**: a stage sees only files modified after its watermark
//! - **Dependency gating**: a newer manifest reinstalls and resets everything
//! - **Output reconciliation**: outputs the compiler stopped emitting are removed
//! - **Latest-wins cancellation**: in watch mode a new change supersedes the running pass
//!
//! The tools themselves (compiler, formatter, spell checker, linter, test
//! runner, package manager) are external collaborators.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagewatch::prelude::*;
//!
//! let mut pipeline = Pipeline::builder(".").build()?;
//! let passed = pipeline
//!     .run_once(&ConsoleReporter, &CancellationToken::new())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod dependencies;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod reconcile;
pub mod reporter;
pub mod source;
pub mod staleness;
pub mod testing;
pub mod utils;
pub mod watch;
pub mod watermark;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, CleanupGuard};
    pub use crate::collaborators::{
        Checker, Collaborators, CompileReport, Compiler, PackageManager, TestRunner, Toolchain,
    };
    pub use crate::config::StagewatchConfig;
    pub use crate::core::Stage;
    pub use crate::errors::{Result, StagewatchError};
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::reporter::{ConsoleReporter, NoOpReporter, Reporter, SignaledReporter};
    pub use crate::watch::WatchSession;
    pub use crate::watermark::{WatermarkRecord, WatermarkStore};
}

pub use prelude::*;
