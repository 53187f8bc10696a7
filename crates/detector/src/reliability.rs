//! Measurement reliability tracking.
//!
//! Counts successful and failed readings and publishes their ratio at most
//! once per elapsed second of host time. Both counters are halved every
//! minute so the rate follows recent sensor behavior and never overflows on
//! long unattended runs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{elapsed_ms, is_valid_reading};

/// Minimum host time between two success-rate refreshes.
pub const RATE_UPDATE_INTERVAL_MS: u32 = 1000;

/// Accumulated refresh time after which both counters are halved.
pub const COUNTER_DECAY_INTERVAL_MS: u32 = 60_000;

/// Decaying success/failure counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityTracker {
    pub(crate) ok_count: u32,
    pub(crate) total_count: u32,
    pub(crate) success_rate: f32,
    pub(crate) ms_since_decay: u32,
    pub(crate) last_update_us: u64,
}

impl ReliabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raw reading taken at `now_us` and return the published rate.
    pub fn observe(&mut self, raw_cm: f32, now_us: u64) -> f32 {
        self.total_count = self.total_count.saturating_add(1);
        if is_valid_reading(raw_cm) {
            self.ok_count = self.ok_count.saturating_add(1);
        }

        let elapsed = elapsed_ms(self.last_update_us, now_us);
        if elapsed >= RATE_UPDATE_INTERVAL_MS {
            self.refresh(elapsed);
            self.last_update_us = now_us;
        }
        self.success_rate
    }

    fn refresh(&mut self, elapsed_ms: u32) {
        self.success_rate = if self.total_count > 0 {
            self.ok_count as f32 / self.total_count as f32
        } else {
            0.0
        };

        self.ms_since_decay = self.ms_since_decay.saturating_add(elapsed_ms);
        if self.ms_since_decay >= COUNTER_DECAY_INTERVAL_MS {
            self.ok_count /= 2;
            self.total_count /= 2;
            self.ms_since_decay = 0;
            debug!(
                ok_count = self.ok_count,
                total_count = self.total_count,
                "Reliability counters decayed"
            );
        }
    }

    /// Fraction of valid readings, in `[0, 1]`, as of the last refresh.
    pub fn success_rate(&self) -> f32 {
        self.success_rate
    }

    pub fn ok_count(&self) -> u32 {
        self.ok_count
    }

    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    pub fn ms_since_decay(&self) -> u32 {
        self.ms_since_decay
    }

    pub fn last_update_us(&self) -> u64 {
        self.last_update_us
    }
}
