//! Mailbox state machine
//!
//! Turns sustained changes of the filtered distance into debounced delivery
//! and collection events. All timing is driven by the caller's timestamp.
//!
//! ```text
//!            occlusion held            clearance held           hold elapsed
//!   Empty ──────────────────▶ HasMail ───────────────▶ Emptied ─────────────▶ Empty
//!                                │                        ▲
//!                     below full │                        │ clearance held
//!                                ▼                        │
//!                               Full ─────────────────────┘
//! ```
//!
//! Readings exactly on a threshold do not cross it. The refractory window
//! only gates `Empty -> HasMail`.

use mailwatch_core::{DetectorConfig, MailboxState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::thresholds::Thresholds;
use crate::{elapsed_ms, is_valid_reading};

/// Event emitted on a confirmed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxEvent {
    /// New mail dropped into an empty box
    MailDetected,
    /// Box emptied by its owner
    MailCollected,
}

/// Machine state with the timers each state actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Empty {
        /// Start of the current delivery occlusion
        occlusion_since_us: Option<u64>,
    },
    HasMail {
        /// Start of the current collection clearance
        clearing_since_us: Option<u64>,
    },
    Full {
        /// Start of the current collection clearance
        clearing_since_us: Option<u64>,
    },
    Emptied {
        /// When the box was found emptied
        since_us: u64,
    },
}

impl Phase {
    pub fn state(&self) -> MailboxState {
        match self {
            Phase::Empty { .. } => MailboxState::Empty,
            Phase::HasMail { .. } => MailboxState::HasMail,
            Phase::Full { .. } => MailboxState::Full,
            Phase::Emptied { .. } => MailboxState::Emptied,
        }
    }

    /// Start of the running occlusion or clearance, if any.
    pub fn hold_started_us(&self) -> Option<u64> {
        match *self {
            Phase::Empty { occlusion_since_us } => occlusion_since_us,
            Phase::HasMail { clearing_since_us } | Phase::Full { clearing_since_us } => {
                clearing_since_us
            }
            Phase::Emptied { .. } => None,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Empty {
            occlusion_since_us: None,
        }
    }
}

/// Result of advancing the machine by one filtered reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub event: Option<MailboxEvent>,
    /// Distance change that confirmed the event (cm)
    pub delta_cm: f32,
    /// How long the condition was held before confirming (ms)
    pub duration_ms: u32,
    /// State after this step
    pub state: MailboxState,
}

impl Step {
    fn idle(state: MailboxState) -> Self {
        Self {
            event: None,
            delta_cm: 0.0,
            duration_ms: 0,
            state,
        }
    }
}

/// Four-state debounce/hysteresis engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MailboxMachine {
    pub(crate) phase: Phase,
    pub(crate) refractory_until_us: u64,
}

/// Advance a debounce timer and return how long it has been running.
fn hold(timer: &mut Option<u64>, now_us: u64) -> u32 {
    let since = *timer.get_or_insert(now_us);
    elapsed_ms(since, now_us)
}

impl MailboxMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one filtered distance observed at `now_us`.
    ///
    /// A non-positive `filtered_cm` leaves the machine untouched. At most one
    /// transition happens per call.
    pub fn advance(
        &mut self,
        filtered_cm: f32,
        now_us: u64,
        thresholds: &Thresholds,
        config: &DetectorConfig,
    ) -> Step {
        let mut step = Step::idle(self.state());
        if !is_valid_reading(filtered_cm) {
            return step;
        }

        let in_refractory = self.in_refractory(now_us);
        let MailboxMachine {
            phase,
            refractory_until_us: refractory,
        } = &mut *self;

        let next = match phase {
            Phase::Empty { occlusion_since_us } => {
                if !in_refractory && filtered_cm < thresholds.trigger_cm {
                    let held_ms = hold(occlusion_since_us, now_us);
                    if held_ms >= config.hold_ms {
                        step.event = Some(MailboxEvent::MailDetected);
                        step.delta_cm = thresholds.baseline_cm - filtered_cm;
                        step.duration_ms = held_ms;
                        *refractory = refractory_deadline(now_us, config);
                        Some(Phase::HasMail {
                            clearing_since_us: None,
                        })
                    } else {
                        None
                    }
                } else {
                    *occlusion_since_us = None;
                    None
                }
            }
            Phase::HasMail { clearing_since_us } => {
                if filtered_cm < thresholds.full_cm {
                    // a clearance already running keeps timing in Full
                    Some(Phase::Full {
                        clearing_since_us: *clearing_since_us,
                    })
                } else if filtered_cm > thresholds.empty_cm {
                    confirm_collection(
                        clearing_since_us,
                        filtered_cm,
                        now_us,
                        thresholds,
                        config,
                        &mut step,
                    )
                } else {
                    *clearing_since_us = None;
                    None
                }
            }
            Phase::Full { clearing_since_us } => {
                if filtered_cm > thresholds.empty_cm {
                    confirm_collection(
                        clearing_since_us,
                        filtered_cm,
                        now_us,
                        thresholds,
                        config,
                        &mut step,
                    )
                } else {
                    *clearing_since_us = None;
                    None
                }
            }
            Phase::Emptied { since_us } => {
                if elapsed_ms(*since_us, now_us) >= config.hold_ms {
                    *refractory = refractory_deadline(now_us, config);
                    Some(Phase::Empty {
                        occlusion_since_us: None,
                    })
                } else {
                    None
                }
            }
        };

        if let Some(next) = next {
            info!(
                from = %phase.state(),
                to = %next.state(),
                event = ?step.event,
                delta_cm = step.delta_cm,
                duration_ms = step.duration_ms,
                "Mailbox state transition"
            );
            *phase = next;
        }

        step.state = self.state();
        step
    }

    pub fn state(&self) -> MailboxState {
        self.phase.state()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// True while an occlusion or clearance is being timed.
    pub fn is_occluding(&self) -> bool {
        self.phase.hold_started_us().is_some()
    }

    pub fn in_refractory(&self, now_us: u64) -> bool {
        now_us < self.refractory_until_us
    }

    pub fn refractory_until_us(&self) -> u64 {
        self.refractory_until_us
    }
}

/// End of the refractory window armed at `now_us`.
fn refractory_deadline(now_us: u64, config: &DetectorConfig) -> u64 {
    now_us.saturating_add(u64::from(config.refractory_ms).saturating_mul(1000))
}

fn confirm_collection(
    clearing_since_us: &mut Option<u64>,
    filtered_cm: f32,
    now_us: u64,
    thresholds: &Thresholds,
    config: &DetectorConfig,
    step: &mut Step,
) -> Option<Phase> {
    let held_ms = hold(clearing_since_us, now_us);
    if held_ms < config.hold_ms {
        return None;
    }

    step.event = Some(MailboxEvent::MailCollected);
    step.delta_cm = filtered_cm - thresholds.trigger_cm;
    step.duration_ms = held_ms;
    Some(Phase::Emptied { since_us: now_us })
}
