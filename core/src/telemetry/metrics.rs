use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counters describing what a single decode pass saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeMetrics {
    pub records_decoded: usize,
    pub formats_registered: usize,
    pub rejected_formats: usize,
    /// Messages whose type had no FMT definition.
    pub unknown_messages: usize,
    /// Messages with a definition the analysis does not consume.
    pub unhandled_messages: usize,
    /// Handled message kinds missing a required field.
    pub malformed_messages: usize,
    pub skipped_bytes: usize,
    pub truncated: bool,
}

impl DecodeMetrics {
    pub fn merge(&mut self, other: &DecodeMetrics) {
        self.records_decoded += other.records_decoded;
        self.formats_registered += other.formats_registered;
        self.rejected_formats += other.rejected_formats;
        self.unknown_messages += other.unknown_messages;
        self.unhandled_messages += other.unhandled_messages;
        self.malformed_messages += other.malformed_messages;
        self.skipped_bytes += other.skipped_bytes;
        self.truncated |= other.truncated;
    }
}

/// Thread-safe accumulator for runs that analyze several logs at once.
pub struct MetricsRecorder {
    inner: Mutex<Totals>,
}

#[derive(Default)]
struct Totals {
    logs_analyzed: usize,
    failures: usize,
    decode: DecodeMetrics,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Totals::default()),
        }
    }

    pub fn record_analyzed(&self, metrics: &DecodeMetrics) {
        if let Ok(mut totals) = self.inner.lock() {
            totals.logs_analyzed += 1;
            totals.decode.merge(metrics);
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut totals) = self.inner.lock() {
            totals.failures += 1;
        }
    }

    /// `(logs analyzed, failed logs, merged decode counters)`.
    pub fn snapshot(&self) -> (usize, usize, DecodeMetrics) {
        if let Ok(totals) = self.inner.lock() {
            (totals.logs_analyzed, totals.failures, totals.decode)
        } else {
            (0, 0, DecodeMetrics::default())
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
