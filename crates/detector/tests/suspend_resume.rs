//! A detector that is snapshotted, encoded and restored before every
//! reading must behave exactly like one that never slept.

use mailwatch_detector::{
    Context, DetectorConfig, DetectorError, DistanceReading, MailboxState, Processor,
    CONTEXT_BYTES,
};
use proptest::prelude::*;

fn config() -> DetectorConfig {
    DetectorConfig {
        filter_window: 5,
        ..Default::default()
    }
}

/// Delivery, failed readings, escalation, collection and settle, 100ms apart.
fn mixed_trace() -> Vec<(u64, f32)> {
    let mut trace = Vec::new();
    let mut t = 0u64;
    let mut push = |raw: f32, n: usize| {
        for _ in 0..n {
            trace.push((t, raw));
            t += 100_000;
        }
    };
    push(40.0, 10);
    push(36.0, 8);
    push(-1.0, 3);
    push(32.0, 10);
    push(0.0, 2);
    push(40.0, 30);
    // a second drop inside the refractory window is ignored
    push(35.0, 50);
    push(40.0, 20);
    trace
}

fn run_awake(trace: &[(u64, f32)]) -> Vec<DistanceReading> {
    let mut p = Processor::new(config()).unwrap();
    trace.iter().map(|&(t, raw)| p.process(raw, t)).collect()
}

fn run_sleeping(trace: &[(u64, f32)]) -> Vec<DistanceReading> {
    let mut stored = Processor::new(config()).unwrap().snapshot().to_bytes();
    trace
        .iter()
        .map(|&(t, raw)| {
            let ctx = Context::from_bytes(&stored).unwrap();
            let mut p = Processor::from_context(config(), ctx).unwrap();
            let reading = p.process(raw, t);
            stored = p.snapshot().to_bytes();
            reading
        })
        .collect()
}

#[test]
fn test_binary_suspend_matches_uninterrupted_run() {
    let trace = mixed_trace();
    let awake = run_awake(&trace);
    let sleeping = run_sleeping(&trace);
    assert_eq!(awake, sleeping);

    assert_eq!(awake.iter().filter(|r| r.mail_detected).count(), 1);
    assert_eq!(awake.iter().filter(|r| r.mail_collected).count(), 1);
    assert_eq!(awake.last().unwrap().state, MailboxState::Empty);
}

#[test]
fn test_json_suspend_matches_uninterrupted_run() {
    let trace = mixed_trace();
    let awake = run_awake(&trace);

    let mut stored = serde_json::to_string(&Processor::new(config()).unwrap().snapshot()).unwrap();
    let mut sleeping = Vec::new();
    for &(t, raw) in &trace {
        let ctx: Context = serde_json::from_str(&stored).unwrap();
        let mut p = Processor::from_context(config(), ctx).unwrap();
        sleeping.push(p.process(raw, t));
        stored = serde_json::to_string(&p.snapshot()).unwrap();
    }
    assert_eq!(awake, sleeping);
}

#[test]
fn test_restore_rejects_corruption() {
    let mut p = Processor::new(config()).unwrap();
    for (t, raw) in mixed_trace().into_iter().take(20) {
        p.process(raw, t);
    }
    let bytes = p.snapshot().to_bytes();
    assert_eq!(bytes.len(), CONTEXT_BYTES);

    for offset in [6, 20, 80, 100, 110, 120] {
        let mut damaged = bytes;
        damaged[offset] ^= 0x40;
        assert!(
            Context::from_bytes(&damaged).is_err(),
            "flip at {offset} accepted"
        );
    }

    assert!(matches!(
        Context::from_bytes(&bytes[1..]),
        Err(DetectorError::SnapshotLength { .. })
    ));
}

#[test]
fn test_restore_rejects_other_window() {
    let ctx = Processor::new(config()).unwrap().snapshot();
    let other = DetectorConfig {
        filter_window: 7,
        ..config()
    };
    assert!(matches!(
        Processor::from_context(other, ctx),
        Err(DetectorError::WindowMismatch { .. })
    ));
}

fn arb_trace() -> impl Strategy<Value = Vec<(u64, f32)>> {
    let raw = prop_oneof![
        8 => 30.0f32..45.0,
        1 => Just(-1.0f32),
        1 => Just(0.0f32),
    ];
    prop::collection::vec((1u64..2_000_000, raw), 1..300).prop_map(|steps| {
        let mut t = 0u64;
        steps
            .into_iter()
            .map(|(gap, raw)| {
                t += gap;
                (t, raw)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_suspend_is_transparent(trace in arb_trace()) {
        prop_assert_eq!(run_awake(&trace), run_sleeping(&trace));
    }

    #[test]
    fn prop_one_event_per_call(trace in arb_trace()) {
        for reading in run_awake(&trace) {
            prop_assert!(!(reading.mail_detected && reading.mail_collected));
            prop_assert_eq!(reading.confidence.is_some(), reading.event().is_some());
            if let Some(c) = reading.confidence {
                prop_assert!((0.0..=1.0).contains(&c));
            }
        }
    }

    #[test]
    fn prop_events_alternate(trace in arb_trace()) {
        let mut last = None;
        for reading in run_awake(&trace) {
            if let Some(event) = reading.event() {
                prop_assert_ne!(Some(event), last);
                last = Some(event);
            }
        }
    }
}
