//! Audit correlation: anomaly -> bounded log window -> audit entry.
//!
//! Every well-formed anomaly yields exactly one entry. Log-source failures
//! of any kind become the "no logs found" sentinel with the reason kept in
//! `log_error`; only a malformed anomaly is rejected, and only that one.

mod log_source;

pub use log_source::{LogSource, SystemLogSource};

use crate::config::{AuditConfig, MAX_WINDOW_SECS};
use crate::detector::{Anomaly, Direction, Metric};
use crate::error::CorrelationError;
use crate::series::format::serde_timestamp;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// `logs` value when nothing could be retrieved.
pub const NO_LOGS_SENTINEL: &str = "no logs found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWindow {
    #[serde(with = "serde_timestamp")]
    pub start: NaiveDateTime,
    #[serde(with = "serde_timestamp")]
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "serde_timestamp")]
    pub timestamp: NaiveDateTime,
    pub process_id: u32,
    pub process_name: String,
    pub anomaly_type: String,
    pub metric: Metric,
    pub direction: Direction,
    pub value: f64,
    pub log_window: LogWindow,
    pub logs: String,
    /// Why `logs` holds the sentinel, when the source failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
}

impl AuditEntry {
    pub fn has_logs(&self) -> bool {
        self.logs != NO_LOGS_SENTINEL
    }
}

/// An anomaly that could not be correlated.
#[derive(Debug)]
pub struct SkippedAnomaly {
    pub sample_index: usize,
    pub error: CorrelationError,
}

#[derive(Debug, Default)]
pub struct AuditBatch {
    pub entries: Vec<AuditEntry>,
    pub skipped: Vec<SkippedAnomaly>,
}

/// Persisted audit document for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub anomalies: Vec<AuditEntry>,
    pub skipped: usize,
}

impl AuditReport {
    pub fn new(entries: Vec<AuditEntry>, skipped: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            anomalies: entries,
            skipped,
        }
    }
}

/// Stateless: output depends only on the anomaly and the log source.
#[derive(Debug, Clone, Copy)]
pub struct AuditCorrelator {
    lead: Duration,
    lag: Duration,
}

impl AuditCorrelator {
    /// Lead and lag are capped at `MAX_WINDOW_SECS`.
    pub fn new(lead_secs: u64, lag_secs: u64) -> Self {
        let secs = |s: u64| Duration::seconds(s.min(MAX_WINDOW_SECS) as i64);
        Self {
            lead: secs(lead_secs),
            lag: secs(lag_secs),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.lead_secs, config.lag_secs)
    }

    /// `[ts - lead, ts + lag]`
    pub fn window(&self, ts: NaiveDateTime) -> LogWindow {
        LogWindow {
            start: ts.checked_sub_signed(self.lead).unwrap_or(NaiveDateTime::MIN),
            end: ts.checked_add_signed(self.lag).unwrap_or(NaiveDateTime::MAX),
        }
    }

    fn check(anomaly: &Anomaly) -> Result<(), CorrelationError> {
        if anomaly.sample.process_id == 0 {
            return Err(CorrelationError::MissingField("process_id"));
        }
        if anomaly.sample.process_name.trim().is_empty() {
            return Err(CorrelationError::MissingField("process_name"));
        }
        Ok(())
    }

    pub fn correlate<L: LogSource + ?Sized>(
        &self,
        anomaly: &Anomaly,
        source: &L,
    ) -> Result<AuditEntry, CorrelationError> {
        Self::check(anomaly)?;
        let sample = &anomaly.sample;
        let window = self.window(sample.timestamp);

        let (logs, log_error) = match source.query(sample.process_id, window.start, window.end) {
            Ok(text) if !text.trim().is_empty() => (text, None),
            Ok(_) => (NO_LOGS_SENTINEL.to_string(), None),
            Err(e) => {
                warn!(pid = sample.process_id, error = %e, "log query failed");
                (NO_LOGS_SENTINEL.to_string(), Some(e.to_string()))
            }
        };

        Ok(AuditEntry {
            timestamp: sample.timestamp,
            process_id: sample.process_id,
            process_name: sample.process_name.clone(),
            anomaly_type: anomaly.metric.anomaly_type().to_string(),
            metric: anomaly.metric,
            direction: anomaly.direction,
            value: anomaly.value,
            log_window: window,
            logs,
            log_error,
        })
    }

    /// Correlate each anomaly independently, in the given order.
    pub fn correlate_all<L: LogSource + ?Sized>(
        &self,
        anomalies: &[Anomaly],
        source: &L,
    ) -> AuditBatch {
        let mut batch = AuditBatch::default();
        for anomaly in anomalies {
            match self.correlate(anomaly, source) {
                Ok(entry) => batch.entries.push(entry),
                Err(error) => {
                    warn!(sample = anomaly.sample_index, %error, "skipping anomaly");
                    batch.skipped.push(SkippedAnomaly {
                        sample_index: anomaly.sample_index,
                        error,
                    });
                }
            }
        }
        debug!(
            entries = batch.entries.len(),
            skipped = batch.skipped.len(),
            "correlation finished"
        );
        batch
    }
}

impl Default for AuditCorrelator {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}
