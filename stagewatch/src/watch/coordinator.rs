//! Latest-wins pass coordination.

use crate::cancellation::CancellationToken;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Whether a pass is in flight.
#[derive(Debug, Clone, Default)]
pub enum PassState {
    /// No pass is running.
    #[default]
    Idle,
    /// A pass is running under this token.
    Running(Arc<CancellationToken>),
}

/// Hands out one token per pass and cancels the previous one.
///
/// At most one token is live at a time; starting a pass supersedes the
/// running one, which must then stop reporting and advance no watermark.
#[derive(Debug, Default)]
pub struct Coordinator {
    state: Mutex<PassState>,
}

impl Coordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the running pass, if any, and starts a new one.
    pub fn begin_pass(&self) -> Arc<CancellationToken> {
        let token = Arc::new(CancellationToken::new());
        let previous = std::mem::replace(&mut *self.state.lock(), PassState::Running(Arc::clone(&token)));
        if let PassState::Running(previous) = previous {
            debug!("Superseding running pass");
            previous.cancel("superseded by a newer change");
        }
        token
    }

    /// Marks the pass of `token` as done.
    ///
    /// Only the current pass returns the coordinator to idle; a superseded
    /// pass finishing late changes nothing. Returns whether it was current.
    pub fn finish(&self, token: &Arc<CancellationToken>) -> bool {
        let mut state = self.state.lock();
        match &*state {
            PassState::Running(current) if Arc::ptr_eq(current, token) => {
                *state = PassState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Cancels the running pass without starting another.
    pub fn cancel_current(&self, reason: &str) {
        if let PassState::Running(current) = std::mem::take(&mut *self.state.lock()) {
            current.cancel(reason);
        }
    }

    /// Returns true if a pass is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), PassState::Running(_))
    }

    /// Returns the token of the running pass.
    #[must_use]
    pub fn current(&self) -> Option<Arc<CancellationToken>> {
        match &*self.state.lock() {
            PassState::Running(token) => Some(Arc::clone(token)),
            PassState::Idle => None,
        }
    }
}
