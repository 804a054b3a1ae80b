//! Reporter that goes quiet once its pass is superseded.

use super::{Location, Reporter};
use crate::cancellation::CancellationToken;
use std::sync::Arc;

/// Wraps a reporter so nothing is emitted after `token` is cancelled.
///
/// Each pass reports through its own wrapper; when a newer change cancels
/// the pass, its remaining output is dropped and the user only sees the
/// outcome of the latest change.
#[derive(Clone)]
pub struct SignaledReporter {
    inner: Arc<dyn Reporter>,
    token: Arc<CancellationToken>,
}

impl SignaledReporter {
    /// Creates a signaled wrapper.
    #[must_use]
    pub fn new(inner: Arc<dyn Reporter>, token: Arc<CancellationToken>) -> Self {
        Self { inner, token }
    }

    fn live(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Reporter for SignaledReporter {
    fn status(&self, message: &str) {
        if self.live() {
            self.inner.status(message);
        }
    }

    fn error(&self, message: &str, location: Option<&Location>) {
        if self.live() {
            self.inner.error(message, location);
        }
    }

    fn fatal(&self, message: &str, detail: &str, location: Option<&Location>) {
        if self.live() {
            self.inner.fatal(message, detail, location);
        }
    }

    fn done(&self) {
        if self.live() {
            self.inner.done();
        }
    }
}

impl std::fmt::Debug for SignaledReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignaledReporter")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
