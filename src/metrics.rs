//! Latency aggregation
//!
//! HDR histograms (microseconds) for time to first byte and time to last byte.
//! Samples that carry errors are counted but never recorded, so partial timings
//! from truncated or failed reads do not skew the percentiles.

use hdrhistogram::Histogram;
use std::time::Duration;

use crate::constants::{HIST_HIGH_US, HIST_LOW_US, HIST_SIGFIG};
use crate::latency::Latency;

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HIST_LOW_US, HIST_HIGH_US, HIST_SIGFIG)
        .expect("static histogram bounds are valid")
}

fn micros(d: Duration) -> u64 {
    (d.as_micros() as u64).max(HIST_LOW_US)
}

/// Percentile snapshot of one histogram
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: f64,
    pub min_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::default();
        }
        Self {
            count: hist.len(),
            mean_us: hist.mean(),
            min_us: hist.min(),
            p50_us: hist.value_at_quantile(0.50),
            p95_us: hist.value_at_quantile(0.95),
            p99_us: hist.value_at_quantile(0.99),
            max_us: hist.max(),
        }
    }
}

/// First-byte and last-byte histograms for one payload size
#[derive(Debug, Clone)]
pub struct LatencyHists {
    first_byte: Histogram<u64>,
    last_byte: Histogram<u64>,
    errored: u64,
    bytes: u64,
}

impl Default for LatencyHists {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHists {
    pub fn new() -> Self {
        Self {
            first_byte: new_histogram(),
            last_byte: new_histogram(),
            errored: 0,
            bytes: 0,
        }
    }

    /// Record one sample; errored samples only bump the error count
    ///
    /// Timings beyond the trackable range count as errored too, so both
    /// histograms always hold the same samples.
    pub fn record(&mut self, latency: &Latency) {
        let Some((first, last)) = latency.valid_timings() else {
            self.errored += 1;
            return;
        };
        let (first, last) = (micros(first), micros(last));
        if first > HIST_HIGH_US || last > HIST_HIGH_US {
            self.errored += 1;
            return;
        }
        // Both values are within bounds, so neither record can be clamped
        self.first_byte.saturating_record(first);
        self.last_byte.saturating_record(last);
        self.bytes += latency.bytes;
    }

    /// Count a sample that produced no `Latency` at all (e.g. its task panicked)
    pub fn record_failed(&mut self) {
        self.errored += 1;
    }

    /// Merge another set of histograms into this one (for combining worker results)
    pub fn merge(&mut self, other: &LatencyHists) {
        self.first_byte.add(&other.first_byte).ok();
        self.last_byte.add(&other.last_byte).ok();
        self.errored += other.errored;
        self.bytes += other.bytes;
    }

    pub fn first_byte(&self) -> LatencyStats {
        LatencyStats::from_histogram(&self.first_byte)
    }

    pub fn last_byte(&self) -> LatencyStats {
        LatencyStats::from_histogram(&self.last_byte)
    }

    /// Samples recorded with valid timings
    pub fn ok_count(&self) -> u64 {
        self.first_byte.len()
    }

    pub fn errored(&self) -> u64 {
        self.errored
    }

    /// Body bytes read by successful samples
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
