//! Distance processing pipeline.
//!
//! Each call feeds one raw reading through the reliability tracker, the
//! median filter and the state machine, in that order, and assembles a
//! [`DistanceReading`]. The processor never reads a clock: the host supplies
//! a monotonically non-decreasing timestamp that keeps counting across
//! sleep, and persists [`Processor::snapshot`] between wake-ups.

use mailwatch_core::{DetectorConfig, MailboxState};
use serde::Serialize;
use tracing::{debug, info};

use crate::confidence::event_confidence;
use crate::context::{Context, CONTEXT_VERSION};
use crate::error::{DetectorError, DetectorResult};
use crate::state_machine::MailboxEvent;
use crate::thresholds::Thresholds;
use crate::is_valid_reading;

/// Output of one [`Processor::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceReading {
    /// Raw sensor distance; non-positive for a failed measurement
    pub raw_cm: f32,
    /// Median of the valid samples in the window; negative if none
    pub filtered_cm: f32,
    /// Recent fraction of valid readings
    pub success_rate: f32,
    /// A new delivery was confirmed on this call
    pub mail_detected: bool,
    /// A collection was confirmed on this call
    pub mail_collected: bool,
    /// Distance change that confirmed the event (cm)
    pub delta_cm: f32,
    /// How long the condition was held before confirming (ms)
    pub duration_ms: u32,
    /// State after this call
    pub state: MailboxState,
    /// Event confidence, present only when an event fired
    pub confidence: Option<f32>,
}

impl DistanceReading {
    pub fn event(&self) -> Option<MailboxEvent> {
        if self.mail_detected {
            Some(MailboxEvent::MailDetected)
        } else if self.mail_collected {
            Some(MailboxEvent::MailCollected)
        } else {
            None
        }
    }
}

/// Mailbox detector owning its persistable [`Context`].
#[derive(Debug, Clone)]
pub struct Processor {
    config: DetectorConfig,
    thresholds: Thresholds,
    ctx: Context,
}

impl Processor {
    /// Create a detector with a fresh context.
    pub fn new(config: DetectorConfig) -> DetectorResult<Self> {
        let thresholds = Thresholds::derive(&config)?;
        log_thresholds(&thresholds, "Processor initialized");
        Ok(Self {
            ctx: Context::fresh(config.filter_window),
            config,
            thresholds,
        })
    }

    /// Resume a detector from a context taken with [`Processor::snapshot`].
    pub fn from_context(config: DetectorConfig, ctx: Context) -> DetectorResult<Self> {
        let thresholds = Thresholds::derive(&config)?;
        if ctx.version() != CONTEXT_VERSION {
            return Err(DetectorError::SnapshotVersion {
                expected: CONTEXT_VERSION,
                actual: ctx.version(),
            });
        }
        ctx.validate()?;
        if ctx.filter().window() != config.filter_window {
            return Err(DetectorError::WindowMismatch {
                config: config.filter_window,
                context: ctx.filter().window(),
            });
        }

        log_thresholds(&thresholds, "Processor restored");
        Ok(Self {
            config,
            thresholds,
            ctx,
        })
    }

    /// Process one raw reading taken at `timestamp_us`.
    pub fn process(&mut self, raw_cm: f32, timestamp_us: u64) -> DistanceReading {
        let (filter, reliability, machine) = self.ctx.parts_mut();

        let success_rate = reliability.observe(raw_cm, timestamp_us);
        let filtered_cm = filter.add_sample(raw_cm);

        let mut reading = DistanceReading {
            raw_cm,
            filtered_cm,
            success_rate,
            mail_detected: false,
            mail_collected: false,
            delta_cm: 0.0,
            duration_ms: 0,
            state: machine.state(),
            confidence: None,
        };

        // a failed measurement freezes the machine even if older samples
        // still produce a filtered value
        if !is_valid_reading(raw_cm) {
            debug!(raw_cm, filtered_cm, state = %reading.state, "Invalid reading, state held");
            return reading;
        }

        let step = machine.advance(filtered_cm, timestamp_us, &self.thresholds, &self.config);
        reading.state = step.state;
        reading.delta_cm = step.delta_cm;
        reading.duration_ms = step.duration_ms;
        match step.event {
            Some(MailboxEvent::MailDetected) => reading.mail_detected = true,
            Some(MailboxEvent::MailCollected) => reading.mail_collected = true,
            None => {}
        }
        if step.event.is_some() {
            reading.confidence = Some(event_confidence(
                step.delta_cm,
                step.duration_ms,
                success_rate,
                &self.config,
            ));
        }

        debug!(
            raw_cm,
            filtered_cm,
            success_rate,
            state = %reading.state,
            "Processed reading"
        );
        reading
    }

    /// Copy of the full mutable state, suitable for persistence.
    pub fn snapshot(&self) -> Context {
        self.ctx
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Derived thresholds, for display only.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn baseline_cm(&self) -> f32 {
        self.thresholds.baseline_cm
    }

    pub fn trigger_threshold_cm(&self) -> f32 {
        self.thresholds.trigger_cm
    }

    pub fn full_threshold_cm(&self) -> f32 {
        self.thresholds.full_cm
    }

    pub fn empty_threshold_cm(&self) -> f32 {
        self.thresholds.empty_cm
    }

    /// Whether a new delivery would currently be suppressed, for display only.
    pub fn in_refractory(&self, now_us: u64) -> bool {
        self.ctx.machine().in_refractory(now_us)
    }

    pub fn state(&self) -> MailboxState {
        self.ctx.machine().state()
    }

    pub fn success_rate(&self) -> f32 {
        self.ctx.reliability().success_rate()
    }
}

fn log_thresholds(thresholds: &Thresholds, message: &str) {
    info!(
        baseline_cm = thresholds.baseline_cm,
        trigger_cm = thresholds.trigger_cm,
        full_cm = thresholds.full_cm,
        empty_cm = thresholds.empty_cm,
        "{}",
        message
    );
}
