//! One wake cycle: restore, measure, process, report, retain.

use mailwatch_core::Config;
use mailwatch_detector::DistanceReading;
use tracing::info;

use crate::clock::VirtualClock;
use crate::report::{build_reports, Report, ReportDecision};
use crate::sensor::DistanceSensor;
use crate::store::RetainedStore;

#[derive(Debug)]
pub struct WakeOutcome {
    pub reading: DistanceReading,
    pub decision: ReportDecision,
    pub reports: Vec<Report>,
    /// Record to retain before sleeping again
    pub store: RetainedStore,
}

/// Run one wake cycle against the retained record, or a fresh one after
/// power-on.
///
/// The caller persists `WakeOutcome::store`, then calls [`finish_wake`] with
/// the measured awake time.
pub fn run_wake(
    config: &Config,
    retained: Option<RetainedStore>,
    sensor: &mut dyn DistanceSensor,
) -> anyhow::Result<WakeOutcome> {
    let (mut store, clock) = match retained {
        Some(mut store) => {
            store.boot_count = store.boot_count.saturating_add(1);
            let mut clock = VirtualClock::resume(store.virtual_time_us);
            clock.wake(config.power.sleep_interval_ms.saturating_mul(1000));
            info!(
                boot_count = store.boot_count,
                virtual_sec = clock.now_sec(),
                "Wakeup"
            );
            (store, clock)
        }
        None => {
            info!("Fresh boot, initializing state");
            (RetainedStore::default(), VirtualClock::fresh())
        }
    };

    let mut processor = store.restore_processor(config.detector)?;
    let raw_cm = sensor.measure();
    let reading = processor.process(raw_cm, clock.now_us());
    info!(
        raw_cm,
        filtered_cm = reading.filtered_cm,
        state = %reading.state,
        "Measured"
    );

    let decision = ReportDecision::decide(
        &reading,
        clock.now_sec(),
        store.last_report_sec,
        config.power.heartbeat_interval_sec,
    );
    let reports = if decision.should_report() {
        info!(
            crucial = decision.crucial,
            periodic = decision.periodic,
            "Reporting"
        );
        build_reports(&reading, &processor, decision, &config.telemetry)
    } else {
        Vec::new()
    };
    if decision.periodic {
        store.last_report_sec = Some(clock.now_sec());
    }

    store.retain(&processor.snapshot());
    store.virtual_time_us = clock.now_us();

    Ok(WakeOutcome {
        reading,
        decision,
        reports,
        store,
    })
}

/// Account for the time spent awake before going back to sleep.
pub fn finish_wake(store: &mut RetainedStore, active_us: u64) {
    let mut clock = VirtualClock::resume(store.virtual_time_us);
    clock.add_active(active_us);
    store.virtual_time_us = clock.now_us();
}
