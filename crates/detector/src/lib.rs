//! Mailwatch detector
//!
//! Infers mail deliveries and collections from a noisy, periodic distance
//! measurement taken from the top of a mailbox.
//!
//! The detector is a pure state-transition function of
//! `(Context, raw_distance, timestamp)`. It performs no I/O and never reads a
//! clock, so a host that powers down between measurements can persist the
//! [`Context`] and resume exactly where it left off.
//!
//! # Example
//!
//! ```
//! use mailwatch_core::DetectorConfig;
//! use mailwatch_detector::{Context, Processor};
//!
//! let config = DetectorConfig::default();
//! let mut processor = Processor::new(config).unwrap();
//! let reading = processor.process(40.0, 0);
//! assert!(!reading.mail_detected);
//!
//! // before sleeping
//! let bytes = processor.snapshot().to_bytes();
//!
//! // after waking up
//! let ctx = Context::from_bytes(&bytes).unwrap();
//! let processor = Processor::from_context(config, ctx).unwrap();
//! assert_eq!(processor.state(), reading.state);
//! ```

pub mod confidence;
pub mod context;
pub mod error;
pub mod filter;
pub mod processor;
pub mod reliability;
pub mod state_machine;
pub mod thresholds;

pub use confidence::event_confidence;
pub use context::{Context, CONTEXT_BYTES, CONTEXT_VERSION};
pub use error::{DetectorError, DetectorResult};
pub use filter::MedianFilter;
pub use processor::{DistanceReading, Processor};
pub use reliability::ReliabilityTracker;
pub use state_machine::{MailboxEvent, MailboxMachine, Phase, Step};
pub use thresholds::Thresholds;

pub use mailwatch_core::{DetectorConfig, MailboxState};

/// Largest supported median filter window.
pub const MAX_FILTER_WINDOW: usize = 15;

/// Filtered value reported when the window holds no valid sample.
pub const INVALID_DISTANCE: f32 = -1.0;

/// Whether a distance counts as a successful measurement.
///
/// Zero, negative and non-finite values are sensor failures or timeouts.
pub fn is_valid_reading(distance_cm: f32) -> bool {
    distance_cm.is_finite() && distance_cm > 0.0
}

/// Whole milliseconds from `since_us` to `now_us`, saturating at both ends.
pub(crate) fn elapsed_ms(since_us: u64, now_us: u64) -> u32 {
    u32::try_from(now_us.saturating_sub(since_us) / 1000).unwrap_or(u32::MAX)
}
