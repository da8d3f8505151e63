//! Injectable time source for save stamping and range scans.
//!
//! # Invariants
//! - `SystemClock` never returns a value smaller than one it already returned,
//!   even if the wall clock steps backwards.
//! - Timestamps are Unix epoch seconds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" used by persistence operations.
pub trait Clock {
    /// Current time in Unix epoch seconds.
    fn now(&self) -> i64;
}

/// Wall-clock time, clamped to be non-decreasing within the process.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

/// Process-wide default clock.
pub static SYSTEM_CLOCK: SystemClock = SystemClock::new();

impl SystemClock {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default();
        let previous = self.last.fetch_max(wall, Ordering::AcqRel);
        previous.max(wall)
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, value: i64) {
        self.now.store(value, Ordering::Release);
    }

    /// Moves the clock forward by `seconds` and returns the new time.
    pub fn advance(&self, seconds: i64) -> i64 {
        self.now.fetch_add(seconds, Ordering::AcqRel) + seconds
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}
