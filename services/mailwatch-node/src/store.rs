//! Record retained across deep sleep.
//!
//! On the device this lives in RTC memory; here it is a small JSON file. The
//! detector context is kept in its checksummed binary form, hex encoded.

use std::path::Path;

use anyhow::Context as _;
use mailwatch_detector::{Context, DetectorConfig, Processor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetainedStore {
    /// Completed wake cycles since power-on
    pub boot_count: u32,
    pub virtual_time_us: u64,
    /// Virtual second of the last status report; `None` until the first one
    pub last_report_sec: Option<u64>,
    /// Hex encoded detector snapshot
    pub context: Option<String>,
}

impl RetainedStore {
    /// Load the store, or `None` if the file does not exist (fresh boot).
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store {}", path.display()))?;
        let store = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse store {}", path.display()))?;
        Ok(Some(store))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write store {}", path.display()))?;
        Ok(())
    }

    /// Rebuild the detector from the retained snapshot.
    ///
    /// A missing, damaged or incompatible snapshot restarts the detector from
    /// a fresh context instead of failing the wake cycle.
    pub fn restore_processor(&self, config: DetectorConfig) -> anyhow::Result<Processor> {
        if let Some(encoded) = &self.context {
            match decode_context(encoded)
                .and_then(|ctx| Processor::from_context(config, ctx).map_err(Into::into))
            {
                Ok(processor) => return Ok(processor),
                Err(e) => warn!(error = %e, "Discarding retained context"),
            }
        } else {
            info!("No retained context, starting fresh");
        }
        Ok(Processor::new(config)?)
    }

    pub fn retain(&mut self, ctx: &Context) {
        self.context = Some(hex::encode(ctx.to_bytes()));
    }
}

fn decode_context(encoded: &str) -> anyhow::Result<Context> {
    let bytes = hex::decode(encoded).context("retained context is not hex")?;
    Ok(Context::from_bytes(&bytes)?)
}
