//! Monotonic time source
//!
//! The engine never reads `Instant::now()` directly; all timing goes through
//! the [`Clock`] trait so tests can drive the scheduler on virtual time.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic steady time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Real time: `Instant::now()` and a blocking thread sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time for tests: a fixed base instant plus a manually advanced
/// offset. `sleep` advances the offset instead of blocking, so scheduler
/// steps run deterministically.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
