//! Cooperative cancellation and scoped cleanup.
//!
//! This module provides:
//! - CancellationToken, one per pipeline pass
//! - CleanupGuard for releasing resources on every exit path

mod cleanup;
mod token;

pub use cleanup::CleanupGuard;
pub use token::CancellationToken;
