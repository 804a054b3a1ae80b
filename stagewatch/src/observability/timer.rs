//! Wall-clock timing for log fields.

use std::time::{Duration, Instant};

/// Times one phase of a pass for a `duration_ms` log field.
#[derive(Debug)]
pub struct SpanTimer {
    phase: &'static str,
    started: Instant,
}

impl SpanTimer {
    /// Starts timing `phase`.
    #[must_use]
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            started: Instant::now(),
        }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The timed phase.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// Stops the timer, returning whole milliseconds.
    #[must_use]
    pub fn finish(self) -> u64 {
        let ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::trace!(phase = self.phase, ms, "Phase timed");
        ms
    }
}
