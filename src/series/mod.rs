//! Samples and the append-only series of one monitoring run.

pub mod format;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use format::{format_timestamp, parse_timestamp, TIMESTAMP_FORMAT};

/// One observation of the tracked process.
///
/// Field order is the persisted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "format::serde_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(alias = "pid")]
    pub process_id: u32,
    pub process_name: String,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub memory_usage_mb: f64,
    #[serde(default)]
    pub io_reads: u64,
    #[serde(default)]
    pub io_writes: u64,
    #[serde(default)]
    pub network_connections: u64,
}

/// Column names in persisted order.
pub const SAMPLE_FIELDS: [&str; 9] = [
    "timestamp",
    "process_id",
    "process_name",
    "cpu_usage_percent",
    "memory_usage_percent",
    "memory_usage_mb",
    "io_reads",
    "io_writes",
    "network_connections",
];

/// Round to two decimals; applied once at capture time.
pub fn round2(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    (v * 100.0).round() / 100.0
}

/// Ordered samples of one run. Insertion order is temporal order.
#[derive(Debug, Clone, Default)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. A timestamp earlier than the last one (wall clock
    /// stepped back) is clamped so the series stays non-decreasing.
    pub fn push(&mut self, mut sample: Sample) -> &Sample {
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                sample.timestamp = last.timestamp;
            }
        }
        self.samples.push(sample);
        &self.samples[self.samples.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Fixed-length view for analysis while the run is still appending.
    /// Samples pushed after this call are not visible through it.
    pub fn snapshot(&self) -> &[Sample] {
        &self.samples[..self.samples.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(sec: u32) -> Sample {
        Sample {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, sec)
                .unwrap(),
            process_id: 1,
            process_name: "p".into(),
            cpu_usage_percent: 0.0,
            memory_usage_percent: 0.0,
            memory_usage_mb: 0.0,
            io_reads: 0,
            io_writes: 0,
            network_connections: 0,
        }
    }

    #[test]
    fn round2_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(f64::NAN), 0.0);
    }

    #[test]
    fn push_clamps_backwards_clock() {
        let mut s = Series::new();
        s.push(at(10));
        let stored = s.push(at(5)).timestamp;
        assert_eq!(stored, at(10).timestamp);
        assert_eq!(s.len(), 2);
        assert!(!s.is_empty());
    }
}
