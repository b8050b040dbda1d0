//! [`Clock`] implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::Clock;

/// Wall-clock time in Unix seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that only moves when told to. Used by the simulator and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self { now: AtomicU64::new(start) }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`, saturating at `u64::MAX`. Returns the new time.
    pub fn advance(&self, secs: u64) -> u64 {
        let next = self.now().saturating_add(secs);
        self.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
