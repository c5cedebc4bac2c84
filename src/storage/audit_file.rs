//! Audit document: one pretty-printed JSON file per run.

use super::ensure_parent;
use crate::audit::AuditReport;
use crate::error::StorageError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn write_audit_report(path: &Path, report: &AuditReport) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, report)?;
    w.write_all(b"\n").map_err(|e| StorageError::io(path, e))?;
    w.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

pub fn read_audit_report(path: &Path) -> Result<AuditReport, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
