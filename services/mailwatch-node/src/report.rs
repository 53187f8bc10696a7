//! Report decision and payloads.
//!
//! The radio is the most expensive thing the node does, so it is only
//! brought up for a confirmed event or when the heartbeat is due.

use mailwatch_core::{MailboxState, TelemetryConfig};
use mailwatch_detector::{DistanceReading, Processor};
use serde::Serialize;

/// Why the radio should be brought up on this wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportDecision {
    /// A delivery or collection was confirmed
    pub crucial: bool,
    /// The heartbeat interval has elapsed
    pub periodic: bool,
}

impl ReportDecision {
    pub fn decide(
        reading: &DistanceReading,
        now_sec: u64,
        last_report_sec: Option<u64>,
        heartbeat_interval_sec: u64,
    ) -> Self {
        let periodic = match last_report_sec {
            Some(last) => now_sec >= last.saturating_add(heartbeat_interval_sec),
            None => true,
        };
        Self {
            crucial: reading.mail_detected || reading.mail_collected,
            periodic,
        }
    }

    pub fn should_report(&self) -> bool {
        self.crucial || self.periodic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailDropEvent {
    pub event: &'static str,
    pub baseline_cm: f32,
    pub before_cm: f32,
    pub after_cm: f32,
    pub delta_cm: f32,
    pub duration_ms: u32,
    pub confidence: f32,
    pub success_rate: f32,
    pub new_state: MailboxState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailCollectedEvent {
    pub event: &'static str,
    pub baseline_cm: f32,
    pub before_cm: f32,
    pub after_cm: f32,
    pub delta_cm: f32,
    pub duration_ms: u32,
    pub success_rate: f32,
    pub new_state: MailboxState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub distance_cm: f32,
    pub filtered_cm: f32,
    pub baseline_cm: f32,
    pub threshold_cm: f32,
    pub success_rate: f32,
    pub mailbox_state: MailboxState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    MailDrop(MailDropEvent),
    MailCollected(MailCollectedEvent),
    Status(StatusReport),
}

/// One message as it would be published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub topic: String,
    pub client_id: String,
    pub payload: Payload,
}

impl Report {
    fn new(telemetry: &TelemetryConfig, subtopic: &str, payload: Payload) -> Self {
        Self {
            topic: format!("{}/{}", telemetry.base_topic.trim_end_matches('/'), subtopic),
            client_id: telemetry.client_id.clone(),
            payload,
        }
    }
}

/// Build the messages for one wake: event reports first, then status.
pub fn build_reports(
    reading: &DistanceReading,
    processor: &Processor,
    decision: ReportDecision,
    telemetry: &TelemetryConfig,
) -> Vec<Report> {
    let baseline_cm = processor.baseline_cm();
    let mut reports = Vec::new();

    if reading.mail_detected {
        let payload = MailDropEvent {
            event: "mail_drop",
            baseline_cm,
            before_cm: baseline_cm,
            after_cm: reading.filtered_cm,
            delta_cm: reading.delta_cm,
            duration_ms: reading.duration_ms,
            confidence: reading.confidence.unwrap_or_default(),
            success_rate: reading.success_rate,
            new_state: reading.state,
        };
        reports.push(Report::new(telemetry, "events/mail_drop", Payload::MailDrop(payload)));
    }

    if reading.mail_collected {
        let payload = MailCollectedEvent {
            event: "mail_collected",
            baseline_cm,
            before_cm: reading.filtered_cm - reading.delta_cm,
            after_cm: reading.filtered_cm,
            delta_cm: reading.delta_cm,
            duration_ms: reading.duration_ms,
            success_rate: reading.success_rate,
            new_state: reading.state,
        };
        reports.push(Report::new(
            telemetry,
            "events/mail_collected",
            Payload::MailCollected(payload),
        ));
    }

    if decision.periodic {
        let payload = StatusReport {
            distance_cm: reading.raw_cm,
            filtered_cm: reading.filtered_cm,
            baseline_cm,
            threshold_cm: processor.trigger_threshold_cm(),
            success_rate: reading.success_rate,
            mailbox_state: reading.state,
        };
        reports.push(Report::new(telemetry, "status", Payload::Status(payload)));
    }

    reports
}
