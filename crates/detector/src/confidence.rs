//! Confidence score attached to confirmed events.

use mailwatch_core::DetectorConfig;

const DELTA_WEIGHT: f32 = 0.5;
const DURATION_WEIGHT: f32 = 0.3;
const RELIABILITY_WEIGHT: f32 = 0.2;

/// Score in `[0, 1]` combining how far the distance moved relative to the
/// trigger delta, how long it was held relative to the hold time, and the
/// sensor's recent success rate.
pub fn event_confidence(
    delta_cm: f32,
    duration_ms: u32,
    success_rate: f32,
    config: &DetectorConfig,
) -> f32 {
    let delta = DELTA_WEIGHT * (delta_cm / config.trigger_delta_cm.max(0.1));
    let duration = DURATION_WEIGHT * (duration_ms as f32 / (config.hold_ms as f32).max(1.0));
    let reliability = RELIABILITY_WEIGHT * success_rate.clamp(0.0, 1.0);

    (delta + duration + reliability).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_add_up() {
        let config = DetectorConfig::default();
        // 0.5 * 3/3 + 0.3 * 125/250 + 0.2 * 0.5
        let c = event_confidence(3.0, 125, 0.5, &config);
        assert!((c - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_capped_at_one() {
        let config = DetectorConfig::default();
        assert_eq!(event_confidence(9.0, 1000, 1.0, &config), 1.0);
    }

    #[test]
    fn test_out_of_range_success_rate_is_clamped() {
        let config = DetectorConfig::default();
        let a = event_confidence(1.5, 0, 7.0, &config);
        let b = event_confidence(1.5, 0, 1.0, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_hold_uses_floor() {
        let config = DetectorConfig {
            hold_ms: 0,
            ..Default::default()
        };
        let c = event_confidence(0.0, 1, 0.0, &config);
        assert!((c - 0.3).abs() < 1e-6);
    }
}
