//! Configuration management for Mailwatch.
//!
//! Every section and field may be omitted from a config file; missing values
//! fall back to the reference mailbox deployment.

use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;

use crate::error::CoreResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub power: PowerConfig,
    pub telemetry: TelemetryConfig,
}

/// Distance detector tuning.
///
/// Three thresholds are derived from `baseline_cm` and `trigger_delta_cm`;
/// see `mailwatch_detector::Thresholds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sensor-to-floor distance of the empty mailbox (cm)
    pub baseline_cm: f32,
    /// Minimum sustained decrease that counts as an occlusion (cm)
    pub trigger_delta_cm: f32,
    /// How long an occlusion or clearance must persist before it is confirmed (ms)
    pub hold_ms: u32,
    /// Cooldown after a confirmed delivery (ms)
    pub refractory_ms: u32,
    /// Median filter window in samples
    pub filter_window: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            baseline_cm: 40.0,
            trigger_delta_cm: 3.0,
            hold_ms: 250,
            refractory_ms: 8000,
            filter_window: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Time spent asleep between two measurements (ms)
    pub sleep_interval_ms: u64,
    /// Maximum silence before a status report is forced (s)
    pub heartbeat_interval_sec: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            sleep_interval_ms: 10_000,
            heartbeat_interval_sec: 7200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub base_topic: String,
    pub client_id: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_topic: "home/mailbox".to_string(),
            client_id: "mailbox-sensor-001".to_string(),
        }
    }
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> CoreResult<Self> {
        let config = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = Config::default_config();
        assert_eq!(config.detector.baseline_cm, 40.0);
        assert_eq!(config.detector.trigger_delta_cm, 3.0);
        assert_eq!(config.detector.hold_ms, 250);
        assert_eq!(config.detector.refractory_ms, 8000);
        assert_eq!(config.detector.filter_window, 5);
        assert_eq!(config.power.heartbeat_interval_sec, 7200);
        assert_eq!(config.telemetry.base_topic, "home/mailbox");
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            [detector]
            baseline_cm = 55.0
            hold_ms = 400

            [power]
            sleep_interval_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.detector.baseline_cm, 55.0);
        assert_eq!(config.detector.hold_ms, 400);
        assert_eq!(config.detector.trigger_delta_cm, 3.0);
        assert_eq!(config.power.sleep_interval_ms, 5000);
        assert_eq!(config.power.heartbeat_interval_sec, 7200);
        assert_eq!(config.telemetry, TelemetryConfig::default());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_malformed_toml_is_rejected() {
        let err = Config::from_toml_str("[detector\nbaseline_cm = ").unwrap_err();
        assert!(err.to_string().starts_with("Config parse error"));
    }

    #[test]
    fn test_json_config() {
        let config =
            Config::from_json_str(r#"{"detector":{"filter_window":3},"telemetry":{"client_id":"box-7"}}"#)
                .unwrap();
        assert_eq!(config.detector.filter_window, 3);
        assert_eq!(config.telemetry.client_id, "box-7");
        assert_eq!(config.telemetry.base_topic, "home/mailbox");
    }
}
