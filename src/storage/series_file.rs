//! Series file: header plus one `;`-delimited record per sample.

use super::{ensure_parent, DELIMITER};
use crate::error::StorageError;
use crate::series::{Sample, SAMPLE_FIELDS};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Incremental writer owned by the sampling run. Each append is flushed,
/// and the underlying csv writer flushes again on drop.
pub struct SeriesWriter<W: Write> {
    inner: csv::Writer<W>,
    written: u64,
}

impl SeriesWriter<File> {
    /// Create (truncate) the series file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
        Self::new(file)
    }
}

impl<W: Write> SeriesWriter<W> {
    /// Wrap a writer and emit the header immediately, so an empty run still
    /// leaves a well-formed file.
    pub fn new(writer: W) -> Result<Self, StorageError> {
        let mut inner = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(writer);
        inner.write_record(SAMPLE_FIELDS)?;
        inner.flush().map_err(csv::Error::from)?;
        Ok(Self { inner, written: 0 })
    }

    pub fn append(&mut self, sample: &Sample) -> Result<(), StorageError> {
        self.inner.serialize(sample)?;
        self.inner.flush().map_err(csv::Error::from)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.inner.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, StorageError> {
        self.inner
            .into_inner()
            .map_err(|e| StorageError::Csv(csv::Error::from(e.into_error())))
    }
}

/// Parse a whole series. Any unreadable record is an error.
pub fn read_series<R: Read>(reader: R) -> Result<Vec<Sample>, StorageError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if !headers.iter().any(|h| h == "timestamp") {
        return Err(StorageError::MissingColumn("timestamp"));
    }
    if !headers.iter().any(|h| h == "process_id" || h == "pid") {
        return Err(StorageError::MissingColumn("process_id"));
    }
    let mut samples = Vec::new();
    for row in rdr.deserialize() {
        samples.push(row?);
    }
    Ok(samples)
}

pub fn read_series_file(path: &Path) -> Result<Vec<Sample>, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    read_series(file)
}
