//! Virtual time that keeps counting across deep sleep.
//!
//! The hardware timer restarts at every wake-up, so the node keeps its own
//! monotonic clock: each wake adds the configured sleep interval and each
//! wake cycle adds how long it actually stayed awake.

const MICROS_PER_SEC: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now_us: u64,
}

impl VirtualClock {
    /// Clock of a node that has just been powered on.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Clock resumed from a retained timestamp.
    pub fn resume(now_us: u64) -> Self {
        Self { now_us }
    }

    /// Account for a completed sleep.
    pub fn wake(&mut self, sleep_us: u64) {
        self.now_us = self.now_us.saturating_add(sleep_us);
    }

    /// Account for time spent awake before going back to sleep.
    pub fn add_active(&mut self, active_us: u64) {
        self.now_us = self.now_us.saturating_add(active_us);
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    pub fn now_sec(&self) -> u64 {
        self.now_us / MICROS_PER_SEC
    }
}
