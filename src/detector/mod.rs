//! Anomaly classification of series samples.
//!
//! Two modes: a fixed literal limit, and mean ± k·std_dev over the series
//! itself (population std_dev, optional floor on upward flags).

mod analysis;
mod baseline;
mod filter;

pub use analysis::{AnalysisReport, AnomalyDetector, OutcomeSummary, RuleOutcome};
pub use baseline::Baseline;
pub use filter::{BaselineScope, HourWindow};

use crate::series::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    MemoryPercent,
    MemoryMb,
    IoReads,
    IoWrites,
    NetworkConnections,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Cpu,
        Metric::MemoryPercent,
        Metric::MemoryMb,
        Metric::IoReads,
        Metric::IoWrites,
        Metric::NetworkConnections,
    ];

    pub fn value(&self, s: &Sample) -> f64 {
        match self {
            Metric::Cpu => s.cpu_usage_percent,
            Metric::MemoryPercent => s.memory_usage_percent,
            Metric::MemoryMb => s.memory_usage_mb,
            Metric::IoReads => s.io_reads as f64,
            Metric::IoWrites => s.io_writes as f64,
            Metric::NetworkConnections => s.network_connections as f64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::MemoryPercent => "memory_percent",
            Metric::MemoryMb => "memory_mb",
            Metric::IoReads => "io_reads",
            Metric::IoWrites => "io_writes",
            Metric::NetworkConnections => "network_connections",
        }
    }

    /// Label used as the audit `anomaly_type`.
    pub fn anomaly_type(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::MemoryPercent => "MEMORY",
            Metric::MemoryMb => "MEMORY_MB",
            Metric::IoReads => "IO_READS",
            Metric::IoWrites => "IO_WRITES",
            Metric::NetworkConnections => "NETWORK_CONNECTIONS",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    Fixed,
    Statistical,
}

/// Threshold policy for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Anomalous iff `value > limit`.
    Fixed { limit: f64 },
    /// Anomalous iff outside `mean ± multiplier·std_dev`. Upward flags
    /// additionally need `value >= floor` when a floor is set.
    Statistical {
        multiplier: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        floor: Option<f64>,
    },
}

impl ThresholdPolicy {
    pub fn mode(&self) -> ClassificationMode {
        match self {
            ThresholdPolicy::Fixed { .. } => ClassificationMode::Fixed,
            ThresholdPolicy::Statistical { .. } => ClassificationMode::Statistical,
        }
    }
}

/// Bounds in effect when a sample was classified. Fixed mode has no lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: f64,
}

/// One classified sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    /// Position of the originating sample in its series.
    pub sample_index: usize,
    pub sample: Sample,
    pub metric: Metric,
    pub value: f64,
    pub bounds: Bounds,
    pub direction: Direction,
    pub mode: ClassificationMode,
    /// Baseline population the bounds were computed over.
    pub scope: BaselineScope,
}

/// Result of one classification pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Present for statistical mode over a non-empty subset.
    pub baseline: Option<Baseline>,
    pub anomalies: Vec<Anomaly>,
}

/// Classify `series` for one metric. Only samples inside `scope` are used
/// for the baseline and classified.
pub fn classify(
    series: &[Sample],
    metric: Metric,
    policy: &ThresholdPolicy,
    scope: BaselineScope,
) -> Detection {
    let selected: Vec<(usize, &Sample)> = series
        .iter()
        .enumerate()
        .filter(|(_, s)| scope.includes(&s.timestamp))
        .collect();

    let make = |(idx, s): (usize, &Sample), bounds: Bounds, direction: Direction| Anomaly {
        sample_index: idx,
        sample: s.clone(),
        metric,
        value: metric.value(s),
        bounds,
        direction,
        mode: policy.mode(),
        scope,
    };

    match *policy {
        ThresholdPolicy::Fixed { limit } => {
            let bounds = Bounds {
                lower: None,
                upper: limit,
            };
            let anomalies = selected
                .into_iter()
                .filter(|(_, s)| metric.value(s) > limit)
                .map(|entry| make(entry, bounds, Direction::Above))
                .collect();
            Detection {
                baseline: None,
                anomalies,
            }
        }
        ThresholdPolicy::Statistical { multiplier, floor } => {
            let baseline = Baseline::compute(selected.iter().map(|(_, s)| metric.value(s)));
            let Some(b) = baseline else {
                return Detection::default();
            };
            if !b.has_spread() {
                return Detection {
                    baseline,
                    anomalies: Vec::new(),
                };
            }
            let (lower, upper) = b.bounds(multiplier);
            let bounds = Bounds {
                lower: Some(lower),
                upper,
            };
            let anomalies = selected
                .into_iter()
                .filter_map(|entry| {
                    let v = metric.value(entry.1);
                    if v > upper && floor.map_or(true, |f| v >= f) {
                        Some(make(entry, bounds, Direction::Above))
                    } else if v < lower {
                        Some(make(entry, bounds, Direction::Below))
                    } else {
                        None
                    }
                })
                .collect();
            Detection {
                baseline,
                anomalies,
            }
        }
    }
}

/// Anomalies for one metric, optionally restricted to an hour window.
pub fn detect(
    series: &[Sample],
    metric: Metric,
    policy: &ThresholdPolicy,
    filter: Option<HourWindow>,
) -> Vec<Anomaly> {
    let scope = filter.map_or(BaselineScope::Full, BaselineScope::Filtered);
    classify(series, metric, policy, scope).anomalies
}
