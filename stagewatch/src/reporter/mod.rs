//! User-facing reporting.
//!
//! Reporters carry what the user sees: stage status lines and the problems
//! found by collaborators. Diagnostics for the operator go through `tracing`.

mod signaled;
mod sink;

pub use signaled::SignaledReporter;
pub use sink::{CollectingReporter, ConsoleReporter, Location, NoOpReporter, Report, Reporter};
