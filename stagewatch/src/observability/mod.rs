//! Observability utilities.
//!
//! Operator diagnostics go through `tracing`; user-facing output goes
//! through [`crate::reporter`].

mod subscriber;
mod timer;

pub use subscriber::{init_tracing, LogFormat};
pub use timer::SpanTimer;
