//! Decide whether a file should be shown as converted legacy-encoded text.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use encoding_rs::{Encoding, GBK};
use tracing::debug;

use super::decode_strict;
use crate::error::{Error, Result};

/// Sniffing that takes longer than this is abandoned in favour of leaving
/// the document alone.
pub const SNIFF_BUDGET: Duration = Duration::from_secs(1);

/// Byte-order marks: UTF-8, UTF-16BE, UTF-16LE, UTF-32BE, UTF-32LE.
const BOMS: [&[u8]; 5] = [
    &[0xEF, 0xBB, 0xBF],
    &[0xFE, 0xFF],
    &[0xFF, 0xFE],
    &[0x00, 0x00, 0xFE, 0xFF],
    &[0xFF, 0xFE, 0x00, 0x00],
];

/// Outcome of sniffing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingDecision {
    SkipHasBom,
    SkipIsAscii,
    SkipTimeout,
    SkipNotLegacy,
    Convert(&'static Encoding),
}

impl EncodingDecision {
    /// The encoding to convert from, if any.
    pub fn encoding(self) -> Option<&'static Encoding> {
        match self {
            Self::Convert(encoding) => Some(encoding),
            _ => None,
        }
    }
}

/// Source of the current time, so the budget can be exercised in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Classifies file contents as BOM-marked, ASCII, legacy-encoded or other.
#[derive(Debug, Clone)]
pub struct Sniffer<C = SystemClock> {
    encoding: &'static Encoding,
    budget: Duration,
    clock: C,
}

impl Sniffer {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Sniffer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            encoding: GBK,
            budget: SNIFF_BUDGET,
            clock,
        }
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn time_budget(&self) -> Duration {
        self.budget
    }

    /// Classify in-memory file contents. `size_on_disk` gates the BOM check
    /// the same way the on-disk length would.
    pub fn sniff(&self, bytes: &[u8], size_on_disk: u64) -> EncodingDecision {
        let start = self.clock.now();
        let decision = self.classify(bytes, size_on_disk);
        self.finish(start, decision)
    }

    /// Read and classify the file at `path`. The time spent reading counts
    /// against the budget.
    pub fn sniff_file(&self, path: &Path) -> Result<EncodingDecision> {
        let start = self.clock.now();
        let size = fs::metadata(path).map_err(|e| Error::io(path, e))?.len();
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let decision = self.classify(&bytes, size);
        Ok(self.finish(start, decision))
    }

    fn classify(&self, bytes: &[u8], size_on_disk: u64) -> EncodingDecision {
        if size_on_disk >= 4 && BOMS.iter().any(|bom| bytes.starts_with(bom)) {
            return EncodingDecision::SkipHasBom;
        }

        if bytes.is_ascii() {
            return EncodingDecision::SkipIsAscii;
        }

        match decode_strict(bytes, self.encoding) {
            Some(_) => EncodingDecision::Convert(self.encoding),
            None => EncodingDecision::SkipNotLegacy,
        }
    }

    fn finish(&self, start: Instant, decision: EncodingDecision) -> EncodingDecision {
        let elapsed = self.clock.now().saturating_duration_since(start);
        debug!(?decision, ?elapsed, "sniffed encoding");

        if elapsed > self.budget && decision.encoding().is_some() {
            debug!(budget = ?self.budget, "sniffing over budget, skipping conversion");
            return EncodingDecision::SkipTimeout;
        }
        decision
    }
}
