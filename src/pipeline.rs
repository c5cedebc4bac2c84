//! Offline stages shared by the CLI commands: series -> anomaly file,
//! anomalies -> audit document.

use crate::audit::{AuditCorrelator, AuditReport, LogSource};
use crate::config::DetectionConfig;
use crate::detector::{AnalysisReport, Anomaly, AnomalyDetector};
use crate::error::StorageError;
use crate::series::Sample;
use crate::storage::{self, ANOMALIES_FILE, AUDIT_FILE};
use std::path::Path;
use tracing::info;

pub struct AnalysisOutput {
    pub report: AnalysisReport,
    pub anomalies: Vec<Anomaly>,
}

/// Run every configured rule over `samples` and write `anomalies.csv`
/// into `report_dir`.
pub fn analyze(
    samples: &[Sample],
    detection: &DetectionConfig,
    report_dir: &Path,
) -> Result<AnalysisOutput, StorageError> {
    let detector = AnomalyDetector::new(detection.clone());
    let report = detector.analyze(samples);
    for s in report.summaries() {
        info!(
            metric = %s.metric,
            scope = ?s.scope,
            mean = s.baseline.map(|b| b.mean),
            std_dev = s.baseline.map(|b| b.std_dev),
            anomalies = s.anomalies,
            "rule outcome"
        );
    }
    let anomalies = report.anomalies();
    let path = report_dir.join(ANOMALIES_FILE);
    storage::write_anomalies_file(&path, &anomalies)?;
    info!(path = %path.display(), count = anomalies.len(), "anomaly file written");
    Ok(AnalysisOutput { report, anomalies })
}

/// Correlate each anomaly with its log window and write `audit_logs.json`
/// into `report_dir`. `rejected_inputs` counts anomalies that never made it
/// this far (unparseable rows) and is added to the document's skip count.
pub fn audit<L: LogSource + ?Sized>(
    anomalies: &[Anomaly],
    rejected_inputs: usize,
    correlator: &AuditCorrelator,
    source: &L,
    report_dir: &Path,
) -> Result<AuditReport, StorageError> {
    let batch = correlator.correlate_all(anomalies, source);
    let with_logs = batch.entries.iter().filter(|e| e.has_logs()).count();
    let report = AuditReport::new(batch.entries, batch.skipped.len() + rejected_inputs);
    let path = report_dir.join(AUDIT_FILE);
    storage::write_audit_report(&path, &report)?;
    info!(
        path = %path.display(),
        entries = report.anomalies.len(),
        with_logs,
        skipped = report.skipped,
        "audit written"
    );
    Ok(report)
}
