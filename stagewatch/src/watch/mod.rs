//! Watch mode.
//!
//! This module provides:
//! - Coordinator, which hands out one cancellation token per pass
//! - ChangeClassifier, which maps changed paths to actions
//! - WatchSession, the debounced file-system loop driving the pipeline

mod classify;
mod coordinator;
mod session;

pub use classify::{Action, ChangeClassifier};
pub use coordinator::{Coordinator, PassState};
pub use session::WatchSession;
