use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces how long a pipeline stage took.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} us)", self.label, elapsed.as_micros());
        }
    }
}

/// Warns when a simulation step overran its time budget.
pub fn warn_if_step_budget_exceeded(duration: Duration, budget_ms: f32) {
    let elapsed_ms = duration.as_secs_f32() * 1000.0;
    if elapsed_ms > budget_ms {
        warn!("physics step exceeded budget: {elapsed_ms:.2} ms > {budget_ms:.2} ms");
    }
}
