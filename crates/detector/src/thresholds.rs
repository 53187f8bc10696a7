//! Hysteresis thresholds derived from the baseline distance.

use mailwatch_core::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, DetectorResult};
use crate::MAX_FILTER_WINDOW;

/// Distances the state machine compares the filtered reading against.
///
/// Invariant: `full_cm < trigger_cm < empty_cm < baseline_cm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Empty-mailbox reference distance
    pub baseline_cm: f32,
    /// Readings below this start a delivery occlusion
    pub trigger_cm: f32,
    /// Readings below this escalate `HasMail` to `Full`
    pub full_cm: f32,
    /// Readings above this start a collection clearance
    pub empty_cm: f32,
}

impl Thresholds {
    /// Validate `config` and derive the threshold set from it.
    pub fn derive(config: &DetectorConfig) -> DetectorResult<Self> {
        validate(config)?;

        let baseline = config.baseline_cm;
        let delta = config.trigger_delta_cm;
        Ok(Self {
            baseline_cm: baseline,
            trigger_cm: baseline - delta,
            full_cm: baseline - 2.0 * delta,
            empty_cm: baseline - 0.5 * delta,
        })
    }
}

fn validate(config: &DetectorConfig) -> DetectorResult<()> {
    if config.filter_window == 0 || config.filter_window as usize > MAX_FILTER_WINDOW {
        return Err(DetectorError::InvalidConfig(format!(
            "filter_window must be in 1..={}, got {}",
            MAX_FILTER_WINDOW, config.filter_window
        )));
    }
    if !config.trigger_delta_cm.is_finite() || config.trigger_delta_cm <= 0.0 {
        return Err(DetectorError::InvalidConfig(format!(
            "trigger_delta_cm must be positive, got {}",
            config.trigger_delta_cm
        )));
    }
    // full threshold has to stay a valid (positive) distance
    if !config.baseline_cm.is_finite() || config.baseline_cm <= 2.0 * config.trigger_delta_cm {
        return Err(DetectorError::InvalidConfig(format!(
            "baseline_cm must exceed twice trigger_delta_cm ({}), got {}",
            2.0 * config.trigger_delta_cm,
            config.baseline_cm
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_thresholds() {
        let t = Thresholds::derive(&DetectorConfig::default()).unwrap();
        assert_eq!(t.baseline_cm, 40.0);
        assert_eq!(t.trigger_cm, 37.0);
        assert_eq!(t.full_cm, 34.0);
        assert_eq!(t.empty_cm, 38.5);
        assert!(t.full_cm < t.trigger_cm && t.trigger_cm < t.empty_cm && t.empty_cm < t.baseline_cm);
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = DetectorConfig {
            filter_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            Thresholds::derive(&config),
            Err(DetectorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_window() {
        let config = DetectorConfig {
            filter_window: MAX_FILTER_WINDOW as u8 + 1,
            ..Default::default()
        };
        assert!(Thresholds::derive(&config).is_err());
    }

    #[test]
    fn test_rejects_non_positive_delta() {
        for delta in [0.0, -1.0, f32::NAN] {
            let config = DetectorConfig {
                trigger_delta_cm: delta,
                ..Default::default()
            };
            assert!(Thresholds::derive(&config).is_err(), "delta {delta} accepted");
        }
    }

    #[test]
    fn test_rejects_baseline_too_close() {
        let config = DetectorConfig {
            baseline_cm: 6.0,
            trigger_delta_cm: 3.0,
            ..Default::default()
        };
        assert!(Thresholds::derive(&config).is_err());
    }
}
