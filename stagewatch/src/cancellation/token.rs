//! Per-pass cancellation token.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::warn;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Cancellation {
    reason: Option<String>,
    pending: Vec<Callback>,
}

/// Cancels one pipeline pass.
///
/// A cancelled pass must stop reporting and must not advance any
/// watermark. Only the first reason is kept; later calls to
/// [`cancel`](Self::cancel) do nothing.
#[derive(Default)]
pub struct CancellationToken {
    flag: AtomicBool,
    state: Mutex<Cancellation>,
    wake: Notify,
}

impl CancellationToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token, runs the registered callbacks and wakes waiters.
    pub fn cancel(&self, reason: impl Into<String>) {
        let pending = {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return;
            }
            state.reason = Some(reason.into());
            self.flag.store(true, Ordering::SeqCst);
            std::mem::take(&mut state.pending)
        };
        self.wake.notify_waiters();
        pending.into_iter().for_each(run_callback);
    }

    /// Runs `callback` once the token is cancelled, or right away if it already is.
    ///
    /// A panicking callback is logged and does not affect the others.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if state.reason.is_none() {
                state.pending.push(Box::new(callback));
                return;
            }
        }
        run_callback(Box::new(callback));
    }

    /// Returns true once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The reason given to the first [`cancel`](Self::cancel).
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.lock().reason.clone()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel can't slip between.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn run_callback(callback: Callback) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
        warn!(?panic, "Cancellation callback panicked");
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish_non_exhaustive()
    }
}
