//! Time sources for deadline evaluation
//!
//! Deadlines are never scheduled. Every call reads `now` once from a
//! [`Clock`] and lazily resolves whatever has fallen due, so the clock is the
//! only source of time the engine ever consults.

use crate::types::{Seconds, Timestamp};
use parking_lot::Mutex;

/// Source of the current time in Unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Manually advanced clock for tests and scenario replay
pub struct ManualClock {
    time: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            time: Mutex::new(start),
        }
    }

    /// Move forward by `secs` and return the new time
    pub fn advance(&self, secs: Seconds) -> Timestamp {
        let mut time = self.time.lock();
        *time = time.saturating_add(secs as i64);
        *time
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, to: Timestamp) {
        let mut time = self.time.lock();
        *time = (*time).max(to);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.time.lock()
    }
}
