//! Median filter over the most recent raw distance samples.
//!
//! Samples are kept in a fixed array so the filter can live inside the
//! persisted [`Context`](crate::Context) without heap allocation. The
//! median only considers valid samples; timeouts and failures still occupy
//! a slot and age out like any other reading.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{is_valid_reading, INVALID_DISTANCE, MAX_FILTER_WINDOW};

/// Fixed-capacity circular median filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedianFilter {
    pub(crate) samples: [f32; MAX_FILTER_WINDOW],
    pub(crate) window: u8,
    pub(crate) cursor: u8,
    pub(crate) count: u8,
    pub(crate) filtered_cm: f32,
}

impl MedianFilter {
    /// Create an empty filter over `window` samples.
    ///
    /// `window` is clamped to `1..=MAX_FILTER_WINDOW`; callers validate it
    /// beforehand through [`Thresholds::derive`](crate::Thresholds::derive).
    pub fn new(window: u8) -> Self {
        Self {
            samples: [0.0; MAX_FILTER_WINDOW],
            window: window.clamp(1, MAX_FILTER_WINDOW as u8),
            cursor: 0,
            count: 0,
            filtered_cm: INVALID_DISTANCE,
        }
    }

    /// Push a raw sample and return the new filtered distance.
    ///
    /// Returns [`INVALID_DISTANCE`] when no valid sample is in the window.
    pub fn add_sample(&mut self, raw_cm: f32) -> f32 {
        // failures are stored as the sentinel so the window stays serializable
        self.samples[self.cursor as usize] = if is_valid_reading(raw_cm) {
            raw_cm
        } else {
            INVALID_DISTANCE
        };
        self.cursor = (self.cursor + 1) % self.window;
        if self.count < self.window {
            self.count += 1;
        }

        self.filtered_cm = self.median();
        trace!(raw_cm, filtered_cm = self.filtered_cm, count = self.count, "Filter sample");
        self.filtered_cm
    }

    /// Last computed filtered distance.
    pub fn filtered_cm(&self) -> f32 {
        self.filtered_cm
    }

    /// Configured window length.
    pub fn window(&self) -> u8 {
        self.window
    }

    /// Number of samples written so far, capped at the window length.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of samples currently in the window that count toward the median.
    pub fn valid_samples(&self) -> usize {
        self.written().iter().filter(|v| is_valid_reading(**v)).count()
    }

    fn written(&self) -> &[f32] {
        &self.samples[..self.count as usize]
    }

    fn median(&self) -> f32 {
        let mut valid = [0.0f32; MAX_FILTER_WINDOW];
        let mut n = 0;
        for &v in self.written() {
            if is_valid_reading(v) {
                valid[n] = v;
                n += 1;
            }
        }
        if n == 0 {
            return INVALID_DISTANCE;
        }

        let valid = &mut valid[..n];
        valid.sort_unstable_by(|a, b| a.total_cmp(b));
        if n % 2 == 1 {
            valid[n / 2]
        } else {
            0.5 * (valid[n / 2 - 1] + valid[n / 2])
        }
    }
}
