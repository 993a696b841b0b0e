//! Time sources for the hosted ledger.
//!
//! The ledger never reads a clock itself; the node passes `now` into every
//! time-sensitive operation.

use std::sync::atomic::{AtomicU64, Ordering};
use tally_core::Timestamp;

pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// Wall clock that never runs backwards.
///
/// A step back in system time (NTP adjustment, manual change) is clamped to
/// the last value handed out.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = chrono::Utc::now().timestamp().max(0) as u64;
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(secs)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
