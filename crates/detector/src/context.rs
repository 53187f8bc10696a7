//! Persistable detector context.
//!
//! The context is everything the detector mutates between calls. It is a
//! flat `Copy` value so a host can park it in any store that survives a
//! power cycle: either through serde, or through the fixed-size binary
//! layout below.
//!
//! Binary layout (little endian):
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `MLBX`                            |
//! | 4      | 2    | layout version                          |
//! | 6      | 1    | filter window                           |
//! | 7      | 1    | filter cursor                           |
//! | 8      | 1    | filter sample count                     |
//! | 9      | 1    | phase tag                               |
//! | 10     | 1    | phase timer running (0/1)               |
//! | 11     | 1    | reserved, zero                          |
//! | 12     | 60   | filter samples (`f32` x 15)             |
//! | 72     | 4    | filtered distance                       |
//! | 76     | 4    | ok count                                |
//! | 80     | 4    | total count                             |
//! | 84     | 4    | success rate                            |
//! | 88     | 4    | ms since decay                          |
//! | 92     | 8    | last rate update (us)                   |
//! | 100    | 8    | phase timestamp (us)                    |
//! | 108    | 8    | refractory until (us)                   |
//! | 116    | 8    | BLAKE3 of bytes 0..116, truncated       |

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, DetectorResult};
use crate::filter::MedianFilter;
use crate::reliability::ReliabilityTracker;
use crate::state_machine::{MailboxMachine, Phase};
use crate::MAX_FILTER_WINDOW;

/// Layout version written by this build.
pub const CONTEXT_VERSION: u16 = 1;

/// Leading bytes of every encoded context.
pub const CONTEXT_MAGIC: [u8; 4] = *b"MLBX";

const CHECKSUM_LEN: usize = 8;
const BODY_LEN: usize = 116;

/// Size of an encoded context.
pub const CONTEXT_BYTES: usize = BODY_LEN + CHECKSUM_LEN;

const TAG_EMPTY: u8 = 0;
const TAG_HAS_MAIL: u8 = 1;
const TAG_FULL: u8 = 2;
const TAG_EMPTIED: u8 = 3;

/// Complete mutable state of one detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Context {
    version: u16,
    filter: MedianFilter,
    reliability: ReliabilityTracker,
    machine: MailboxMachine,
}

impl Context {
    /// Context of a detector that has never seen a reading.
    pub fn fresh(filter_window: u8) -> Self {
        Self {
            version: CONTEXT_VERSION,
            filter: MedianFilter::new(filter_window),
            reliability: ReliabilityTracker::new(),
            machine: MailboxMachine::new(),
        }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn filter(&self) -> &MedianFilter {
        &self.filter
    }

    pub fn reliability(&self) -> &ReliabilityTracker {
        &self.reliability
    }

    pub fn machine(&self) -> &MailboxMachine {
        &self.machine
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut MedianFilter, &mut ReliabilityTracker, &mut MailboxMachine) {
        (&mut self.filter, &mut self.reliability, &mut self.machine)
    }

    /// Encode into the fixed binary layout.
    pub fn to_bytes(&self) -> [u8; CONTEXT_BYTES] {
        let (tag, timer, phase_us) = encode_phase(&self.machine.phase);

        let mut w = Writer::new();
        w.put(&CONTEXT_MAGIC);
        w.put(&self.version.to_le_bytes());
        w.put(&[
            self.filter.window,
            self.filter.cursor,
            self.filter.count,
            tag,
            timer,
            0,
        ]);
        for sample in &self.filter.samples {
            w.put(&sample.to_le_bytes());
        }
        w.put(&self.filter.filtered_cm.to_le_bytes());
        w.put(&self.reliability.ok_count.to_le_bytes());
        w.put(&self.reliability.total_count.to_le_bytes());
        w.put(&self.reliability.success_rate.to_le_bytes());
        w.put(&self.reliability.ms_since_decay.to_le_bytes());
        w.put(&self.reliability.last_update_us.to_le_bytes());
        w.put(&phase_us.to_le_bytes());
        w.put(&self.machine.refractory_until_us.to_le_bytes());
        debug_assert_eq!(w.pos, BODY_LEN);

        let tag_bytes = checksum(&w.buf[..BODY_LEN]);
        w.put(&tag_bytes);
        w.buf
    }

    /// Decode and validate a context produced by [`Context::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> DetectorResult<Self> {
        if bytes.len() != CONTEXT_BYTES {
            return Err(DetectorError::SnapshotLength {
                expected: CONTEXT_BYTES,
                actual: bytes.len(),
            });
        }

        let mut r = Reader::new(bytes);
        if r.take::<4>() != CONTEXT_MAGIC {
            return Err(DetectorError::SnapshotMagic);
        }
        let version = u16::from_le_bytes(r.take());
        if version != CONTEXT_VERSION {
            return Err(DetectorError::SnapshotVersion {
                expected: CONTEXT_VERSION,
                actual: version,
            });
        }
        if checksum(&bytes[..BODY_LEN]) != bytes[BODY_LEN..] {
            return Err(DetectorError::SnapshotChecksum);
        }

        let [window, cursor, count, tag, timer, _reserved] = r.take::<6>();

        let mut samples = [0.0f32; MAX_FILTER_WINDOW];
        for sample in samples.iter_mut() {
            *sample = f32::from_le_bytes(r.take());
        }
        let filtered_cm = f32::from_le_bytes(r.take());

        let reliability = ReliabilityTracker {
            ok_count: u32::from_le_bytes(r.take()),
            total_count: u32::from_le_bytes(r.take()),
            success_rate: f32::from_le_bytes(r.take()),
            ms_since_decay: u32::from_le_bytes(r.take()),
            last_update_us: u64::from_le_bytes(r.take()),
        };
        let phase_us = u64::from_le_bytes(r.take());
        let refractory_until_us = u64::from_le_bytes(r.take());

        let ctx = Self {
            version,
            filter: MedianFilter {
                samples,
                window,
                cursor,
                count,
                filtered_cm,
            },
            reliability,
            machine: MailboxMachine {
                phase: decode_phase(tag, timer, phase_us)?,
                refractory_until_us,
            },
        };
        ctx.validate()?;
        Ok(ctx)
    }

    /// Check the invariants a deserialized context cannot guarantee.
    pub fn validate(&self) -> DetectorResult<()> {
        let MedianFilter {
            window,
            cursor,
            count,
            ..
        } = self.filter;
        if window == 0
            || window as usize > MAX_FILTER_WINDOW
            || cursor >= window
            || count > window
        {
            return Err(DetectorError::SnapshotCorrupt(format!(
                "filter geometry window={window} cursor={cursor} count={count}"
            )));
        }
        Ok(())
    }
}

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = blake3::hash(body);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
    out
}

fn encode_phase(phase: &Phase) -> (u8, u8, u64) {
    let timer = |since: Option<u64>| (u8::from(since.is_some()), since.unwrap_or(0));
    match *phase {
        Phase::Empty { occlusion_since_us } => {
            let (running, since) = timer(occlusion_since_us);
            (TAG_EMPTY, running, since)
        }
        Phase::HasMail { clearing_since_us } => {
            let (running, since) = timer(clearing_since_us);
            (TAG_HAS_MAIL, running, since)
        }
        Phase::Full { clearing_since_us } => {
            let (running, since) = timer(clearing_since_us);
            (TAG_FULL, running, since)
        }
        Phase::Emptied { since_us } => (TAG_EMPTIED, 0, since_us),
    }
}

fn decode_phase(tag: u8, timer: u8, phase_us: u64) -> DetectorResult<Phase> {
    let since = match timer {
        0 => None,
        1 => Some(phase_us),
        other => {
            return Err(DetectorError::SnapshotCorrupt(format!(
                "timer flag {other}"
            )))
        }
    };
    match tag {
        TAG_EMPTY => Ok(Phase::Empty {
            occlusion_since_us: since,
        }),
        TAG_HAS_MAIL => Ok(Phase::HasMail {
            clearing_since_us: since,
        }),
        TAG_FULL => Ok(Phase::Full {
            clearing_since_us: since,
        }),
        TAG_EMPTIED => Ok(Phase::Emptied { since_us: phase_us }),
        other => Err(DetectorError::SnapshotCorrupt(format!(
            "unknown phase tag {other}"
        ))),
    }
}

struct Writer {
    buf: [u8; CONTEXT_BYTES],
    pos: usize,
}

impl Writer {
    fn new() -> Self {
        Self {
            buf: [0u8; CONTEXT_BYTES],
            pos: 0,
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

/// Cursor over a slice whose length was checked up front.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Processor;
    use mailwatch_core::DetectorConfig;

    fn busy_context() -> Context {
        let mut processor = Processor::new(DetectorConfig::default()).unwrap();
        for (i, raw) in [40.0, 40.0, -1.0, 35.0, 35.0, 35.0, 35.0, 35.0, 35.0]
            .iter()
            .enumerate()
        {
            processor.process(*raw, i as u64 * 200_000);
        }
        processor.snapshot()
    }

    #[test]
    fn test_layout_size() {
        assert_eq!(CONTEXT_BYTES, 124);
        let bytes = Context::fresh(5).to_bytes();
        assert_eq!(&bytes[..4], b"MLBX");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CONTEXT_VERSION);
    }

    #[test]
    fn test_binary_restore_is_exact() {
        let ctx = busy_context();
        assert_eq!(Context::from_bytes(&ctx.to_bytes()).unwrap(), ctx);
    }

    #[test]
    fn test_every_phase_survives_encoding() {
        let phases = [
            Phase::Empty { occlusion_since_us: None },
            Phase::Empty { occlusion_since_us: Some(17) },
            Phase::HasMail { clearing_since_us: Some(0) },
            Phase::Full { clearing_since_us: None },
            Phase::Emptied { since_us: 9_000_000 },
        ];
        for phase in phases {
            let mut ctx = Context::fresh(3);
            ctx.machine.phase = phase;
            let decoded = Context::from_bytes(&ctx.to_bytes()).unwrap();
            assert_eq!(*decoded.machine().phase(), phase);
        }
    }

    #[test]
    fn test_rejects_wrong_length() {
        let bytes = Context::fresh(5).to_bytes();
        assert_eq!(
            Context::from_bytes(&bytes[..100]),
            Err(DetectorError::SnapshotLength {
                expected: CONTEXT_BYTES,
                actual: 100
            })
        );
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = Context::fresh(5).to_bytes();
        bytes[0] = b'X';
        assert_eq!(Context::from_bytes(&bytes), Err(DetectorError::SnapshotMagic));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = Context::fresh(5).to_bytes();
        bytes[4..6].copy_from_slice(&2u16.to_le_bytes());
        assert_eq!(
            Context::from_bytes(&bytes),
            Err(DetectorError::SnapshotVersion {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_detects_bit_flip() {
        let mut bytes = busy_context().to_bytes();
        bytes[40] ^= 0x01;
        assert_eq!(Context::from_bytes(&bytes), Err(DetectorError::SnapshotChecksum));
    }

    #[test]
    fn test_rejects_unknown_phase_tag() {
        let mut bytes = Context::fresh(5).to_bytes();
        bytes[9] = 9;
        let tag = checksum(&bytes[..BODY_LEN]);
        bytes[BODY_LEN..].copy_from_slice(&tag);
        assert!(matches!(
            Context::from_bytes(&bytes),
            Err(DetectorError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn test_rejects_inconsistent_filter_geometry() {
        let mut bytes = Context::fresh(5).to_bytes();
        bytes[7] = 5; // cursor == window
        let tag = checksum(&bytes[..BODY_LEN]);
        bytes[BODY_LEN..].copy_from_slice(&tag);
        assert!(matches!(
            Context::from_bytes(&bytes),
            Err(DetectorError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn test_json_restore_survives_nan_reading() {
        let mut processor = Processor::new(DetectorConfig::default()).unwrap();
        processor.process(40.0, 0);
        processor.process(f32::NAN, 100_000);
        let ctx = processor.snapshot();

        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_validate_rejects_tampered_geometry() {
        let ctx = busy_context();
        assert_eq!(ctx.validate(), Ok(()));

        for (field, value) in [("cursor", 40), ("count", 6), ("window", 0), ("window", 16)] {
            let mut json = serde_json::to_value(ctx).unwrap();
            json["filter"][field] = value.into();
            let tampered: Context = serde_json::from_value(json).unwrap();
            assert!(
                matches!(tampered.validate(), Err(DetectorError::SnapshotCorrupt(_))),
                "{field}={value} accepted"
            );
        }
    }

    #[test]
    fn test_json_restore_is_exact() {
        let ctx = busy_context();
        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
