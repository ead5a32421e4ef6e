//! Redraw Scheduler
//!
//! Separates "a value changed" from "the screen updates". Handlers mark the
//! state dirty; the gate lets a repaint through only when something changed
//! and the minimum interval has passed since the previous repaint.

use std::time::{Duration, Instant};

/// Throttling gate for full-screen repaints
#[derive(Clone, Debug)]
pub struct RedrawScheduler {
    dirty: bool,
    /// `None` until the first repaint, and again after [`RedrawScheduler::force`]
    last_repaint: Option<Instant>,
    min_interval: Duration,
}

impl RedrawScheduler {
    /// Create a clean scheduler
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            dirty: false,
            last_repaint: None,
            min_interval,
        }
    }

    /// Record that displayed state changed
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a change is waiting to be painted
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the minimum interval between repaints
    pub fn set_interval(&mut self, min_interval: Duration) {
        self.min_interval = min_interval;
    }

    /// Minimum interval between repaints
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.min_interval
    }

    /// Make the next gate evaluation pass regardless of timing
    pub fn force(&mut self) {
        self.dirty = true;
        self.last_repaint = None;
    }

    /// Evaluate the gate; on `true` the caller must repaint
    pub fn should_redraw(&mut self, now: Instant) -> bool {
        if !self.dirty {
            return false;
        }

        let due = match self.last_repaint {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.min_interval,
        };

        if due {
            self.dirty = false;
            self.last_repaint = Some(now);
        }
        due
    }
}
