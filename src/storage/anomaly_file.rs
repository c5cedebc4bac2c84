//! Anomaly file: the originating sample's columns followed by the
//! classification. Read back by the audit stage, which must survive bad
//! rows, so reading rejects rows individually instead of failing the file.
//!
//! One row per merged anomaly: when several rules flag the same sample,
//! metric and direction, the row carries the first rule's bounds and the
//! `scope` column names the baseline they came from (`full` or `HH-HH`).
//! Files without a `scope` column read as `full`.
//!
//! Files produced by the older CPU dashboard (sample columns plus a
//! `cpu_anomaly` True/False column) are accepted as fixed-threshold CPU
//! anomalies.

use super::{ensure_parent, DELIMITER};
use crate::detector::{Anomaly, BaselineScope, Bounds, ClassificationMode, Direction, Metric};
use crate::error::StorageError;
use crate::series::format::serde_timestamp;
use crate::series::Sample;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Limit the legacy dashboard flagged CPU against.
const LEGACY_CPU_LIMIT: f64 = 50.0;

#[derive(Debug, Serialize, Deserialize)]
struct AnomalyRecord {
    #[serde(with = "serde_timestamp")]
    timestamp: NaiveDateTime,
    #[serde(alias = "pid")]
    process_id: u32,
    process_name: String,
    cpu_usage_percent: f64,
    memory_usage_percent: f64,
    memory_usage_mb: f64,
    io_reads: u64,
    io_writes: u64,
    network_connections: u64,
    metric: Metric,
    value: f64,
    direction: Direction,
    lower_bound: Option<f64>,
    upper_bound: f64,
    mode: ClassificationMode,
    #[serde(default, with = "scope_column")]
    scope: BaselineScope,
}

mod scope_column {
    use crate::detector::BaselineScope;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(scope: &BaselineScope, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(scope)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BaselineScope, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(with = "serde_timestamp")]
    timestamp: NaiveDateTime,
    #[serde(alias = "process_id")]
    pid: u32,
    process_name: String,
    cpu_usage_percent: f64,
    memory_usage_percent: f64,
    memory_usage_mb: f64,
    #[serde(default)]
    io_reads: u64,
    #[serde(default)]
    io_writes: u64,
    #[serde(default)]
    network_connections: u64,
    cpu_anomaly: String,
}

impl AnomalyRecord {
    fn from_anomaly(a: &Anomaly) -> Self {
        let s = &a.sample;
        Self {
            timestamp: s.timestamp,
            process_id: s.process_id,
            process_name: s.process_name.clone(),
            cpu_usage_percent: s.cpu_usage_percent,
            memory_usage_percent: s.memory_usage_percent,
            memory_usage_mb: s.memory_usage_mb,
            io_reads: s.io_reads,
            io_writes: s.io_writes,
            network_connections: s.network_connections,
            metric: a.metric,
            value: a.value,
            direction: a.direction,
            lower_bound: a.bounds.lower,
            upper_bound: a.bounds.upper,
            mode: a.mode,
            scope: a.scope,
        }
    }

    fn into_anomaly(self, sample_index: usize) -> Anomaly {
        Anomaly {
            sample_index,
            sample: Sample {
                timestamp: self.timestamp,
                process_id: self.process_id,
                process_name: self.process_name,
                cpu_usage_percent: self.cpu_usage_percent,
                memory_usage_percent: self.memory_usage_percent,
                memory_usage_mb: self.memory_usage_mb,
                io_reads: self.io_reads,
                io_writes: self.io_writes,
                network_connections: self.network_connections,
            },
            metric: self.metric,
            value: self.value,
            bounds: Bounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            },
            direction: self.direction,
            mode: self.mode,
            scope: self.scope,
        }
    }
}

impl LegacyRecord {
    fn into_anomaly(self, sample_index: usize) -> Option<Anomaly> {
        if !self.cpu_anomaly.trim().eq_ignore_ascii_case("true") {
            return None;
        }
        Some(Anomaly {
            sample_index,
            value: self.cpu_usage_percent,
            sample: Sample {
                timestamp: self.timestamp,
                process_id: self.pid,
                process_name: self.process_name,
                cpu_usage_percent: self.cpu_usage_percent,
                memory_usage_percent: self.memory_usage_percent,
                memory_usage_mb: self.memory_usage_mb,
                io_reads: self.io_reads,
                io_writes: self.io_writes,
                network_connections: self.network_connections,
            },
            metric: Metric::Cpu,
            bounds: Bounds {
                lower: None,
                upper: LEGACY_CPU_LIMIT,
            },
            direction: Direction::Above,
            mode: ClassificationMode::Fixed,
            scope: BaselineScope::Full,
        })
    }
}

/// A data row that could not be turned into an anomaly.
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// 1-based line in the file, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct AnomalyLoad {
    pub anomalies: Vec<Anomaly>,
    pub rejected: Vec<RejectedRow>,
}

pub fn write_anomalies_file(path: &Path, anomalies: &[Anomaly]) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(file);
    for a in anomalies {
        wtr.serialize(AnomalyRecord::from_anomaly(a))?;
    }
    if anomalies.is_empty() {
        // serde writes the header with the first record only
        wtr.write_record(HEADER)?;
    }
    wtr.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

const HEADER: [&str; 16] = [
    "timestamp",
    "process_id",
    "process_name",
    "cpu_usage_percent",
    "memory_usage_percent",
    "memory_usage_mb",
    "io_reads",
    "io_writes",
    "network_connections",
    "metric",
    "value",
    "direction",
    "lower_bound",
    "upper_bound",
    "mode",
    "scope",
];

/// Read anomalies. Only an unreadable file or header is an error; bad rows
/// are collected in `rejected` with a diagnostic.
pub fn read_anomalies<R: Read>(reader: R) -> Result<AnomalyLoad, StorageError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);
    let legacy = !has("metric") && has("cpu_anomaly");
    if !legacy && !has("metric") {
        return Err(StorageError::MissingColumn("metric"));
    }

    let mut load = AnomalyLoad::default();
    for (row, record) in rdr.records().enumerate() {
        let line = row as u64 + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                reject(&mut load, line, e.to_string());
                continue;
            }
        };
        let parsed = if legacy {
            record
                .deserialize::<LegacyRecord>(Some(&headers))
                .map(|r| r.into_anomaly(row))
        } else {
            record
                .deserialize::<AnomalyRecord>(Some(&headers))
                .map(|r| Some(r.into_anomaly(row)))
        };
        match parsed {
            Ok(Some(a)) => load.anomalies.push(a),
            Ok(None) => {}
            Err(e) => reject(&mut load, line, e.to_string()),
        }
    }
    Ok(load)
}

fn reject(load: &mut AnomalyLoad, line: u64, reason: String) {
    warn!(line, %reason, "skipping malformed anomaly row");
    load.rejected.push(RejectedRow { line, reason });
}

pub fn read_anomalies_file(path: &Path) -> Result<AnomalyLoad, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    read_anomalies(file)
}
