//! Persisted artifacts: the series file, the anomaly file, the audit document.
//! Delimited files use `;` so locale-formatted decimals never collide.

mod anomaly_file;
mod audit_file;
mod series_file;

pub use anomaly_file::{
    read_anomalies, read_anomalies_file, write_anomalies_file, AnomalyLoad, RejectedRow,
};
pub use audit_file::{read_audit_report, write_audit_report};
pub use series_file::{read_series, read_series_file, SeriesWriter};

pub const DELIMITER: u8 = b';';

/// File names inside a report directory.
pub const ANOMALIES_FILE: &str = "anomalies.csv";
pub const AUDIT_FILE: &str = "audit_logs.json";

/// Create the parent directory of `path` if needed.
pub(crate) fn ensure_parent(path: &std::path::Path) -> Result<(), crate::error::StorageError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| crate::error::StorageError::io(dir, e))
        }
        _ => Ok(()),
    }
}
