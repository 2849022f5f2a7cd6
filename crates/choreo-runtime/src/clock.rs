#![forbid(unsafe_code)]

//! Clock abstraction for the frame scheduler.
//!
//! The scheduler measures elapsed-within-frame and per-job wall-clock time
//! through [`Clock`] rather than calling `Instant::now()` directly, so tests
//! and virtual-time hosts (replay harnesses, headless embeddings) can drive
//! time explicitly. Production uses [`MonotonicClock`].

use std::cell::RefCell;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// Source of monotonic time for in-frame measurements.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually-advanced clock for tests and virtual-time hosts.
///
/// Clones share the same underlying time; a clone captured inside a scheduled
/// job can advance time "during" the job's execution, which is how job
/// wall-clock overruns are simulated deterministically.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<RefCell<Instant>>,
}

impl ManualClock {
    /// Create a manual clock starting at `start`.
    #[must_use]
    pub fn new(start: Instant) -> Self {
        Self {
            now: Rc::new(RefCell::new(start)),
        }
    }

    /// Advance shared time by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.borrow_mut();
        *now += delta;
    }

    /// Set shared time to an absolute instant.
    pub fn set(&self, instant: Instant) {
        *self.now.borrow_mut() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.borrow()
    }
}
