//! Time Sources
//!
//! The renderer reads time through a [`Clock`] so redraw throttling, elapsed
//! times and removal timers can be driven deterministically in tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// Source of monotonic instants and wall-clock timestamps
pub trait Clock: Send + Sync {
    /// Monotonic time, used for intervals and elapsed times
    fn now(&self) -> Instant;

    /// Wall-clock time, used for human timestamps
    fn wall(&self) -> DateTime<Local>;
}

/// The real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same offset, so a test can keep one handle and give
/// another to the renderer.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Local>,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Local::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Time elapsed since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn wall(&self) -> DateTime<Local> {
        let offset = *self.offset.lock();
        self.wall_origin + chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero())
    }
}
