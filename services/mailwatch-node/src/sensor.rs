//! Distance sensor seam and trace-file replay.

use std::path::Path;

use anyhow::{bail, Context as _};
use mailwatch_detector::INVALID_DISTANCE;

/// Source of one raw distance per wake cycle.
pub trait DistanceSensor {
    /// Distance in cm; zero or negative on timeout or failure.
    fn measure(&mut self) -> f32;
}

/// Replays recorded distances, one per measurement.
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    values: Vec<f32>,
    next: usize,
}

impl ReplaySensor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, next: 0 }
    }

    /// Load a trace with one distance per line; blank lines and `#` comments
    /// are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trace {}", path.display()))?;
        Ok(Self::new(parse_distances(&raw)?))
    }

    /// Skip the first `n` measurements, e.g. those consumed by earlier wakes.
    pub fn skip_to(mut self, n: usize) -> Self {
        self.next = n;
        self
    }
}

impl DistanceSensor for ReplaySensor {
    fn measure(&mut self) -> f32 {
        let value = self.values.get(self.next).copied().unwrap_or(INVALID_DISTANCE);
        self.next = self.next.saturating_add(1);
        value
    }
}

fn data_lines<'a>(raw: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

pub fn parse_distances(raw: &str) -> anyhow::Result<Vec<f32>> {
    data_lines(raw)
        .map(|(n, line)| {
            line.parse::<f32>()
                .with_context(|| format!("line {n}: invalid distance {line:?}"))
        })
        .collect()
}

/// Parse a timed trace of `t_ms raw_cm` pairs.
pub fn parse_timed_trace(raw: &str) -> anyhow::Result<Vec<(u64, f32)>> {
    let mut trace = Vec::new();
    let mut last_ms = 0u64;
    for (n, line) in data_lines(raw) {
        let mut fields = line.split_whitespace();
        let (Some(t), Some(d), None) = (fields.next(), fields.next(), fields.next()) else {
            bail!("line {n}: expected `t_ms raw_cm`, got {line:?}");
        };
        let t_ms: u64 = t
            .parse()
            .with_context(|| format!("line {n}: invalid timestamp {t:?}"))?;
        let raw_cm: f32 = d
            .parse()
            .with_context(|| format!("line {n}: invalid distance {d:?}"))?;
        if t_ms < last_ms {
            bail!("line {n}: timestamp {t_ms} goes backwards");
        }
        last_ms = t_ms;
        trace.push((t_ms, raw_cm));
    }
    Ok(trace)
}
