//! Metric sources: process listing and per-process resource readings.
//! The sysinfo-backed source covers CPU and memory on every platform;
//! I/O counters and connection counts come from `/proc` on Linux.

mod io;
mod network;
mod process;

use serde::{Deserialize, Serialize};

pub use io::IoCounters;
pub use process::SysinfoSource;

/// Process as seen in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Creation time, seconds since epoch.
    pub start_time: u64,
}

/// Why a single optional field could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    PermissionDenied,
    Unsupported,
    Other(String),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::PermissionDenied => write!(f, "permission denied"),
            FieldError::Unsupported => write!(f, "unsupported on this platform"),
            FieldError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<std::io::Error> for FieldError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => FieldError::PermissionDenied,
            _ => FieldError::Other(e.to_string()),
        }
    }
}

/// One raw reading. CPU and memory are mandatory; the rest fail independently.
#[derive(Debug, Clone)]
pub struct RawMetrics {
    /// Creation time of the process that answered, to detect pid reuse.
    pub start_time: u64,
    /// Usage since the previous refresh of the same pid; may exceed 100.
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_rss_bytes: u64,
    pub io: Result<IoCounters, FieldError>,
    pub connections: Result<u64, FieldError>,
}

/// OS process-introspection facility.
pub trait MetricSource {
    /// Live processes ordered by creation (start time, then pid).
    fn list_processes(&mut self) -> Vec<ProcessInfo>;

    /// Refresh one process; `None` once it no longer exists.
    fn lookup(&mut self, pid: u32) -> Option<ProcessInfo>;

    /// Read metrics for a live pid; `None` if the process vanished.
    /// CPU usage covers the time since the previous refresh of this pid,
    /// so nothing else may refresh it between two reads.
    fn read_metrics(&mut self, pid: u32) -> Option<RawMetrics>;
}

impl<S: MetricSource + ?Sized> MetricSource for &mut S {
    fn list_processes(&mut self) -> Vec<ProcessInfo> {
        (**self).list_processes()
    }

    fn lookup(&mut self, pid: u32) -> Option<ProcessInfo> {
        (**self).lookup(pid)
    }

    fn read_metrics(&mut self, pid: u32) -> Option<RawMetrics> {
        (**self).read_metrics(pid)
    }
}

/// Sort a listing into creation order.
pub fn creation_order(mut procs: Vec<ProcessInfo>) -> Vec<ProcessInfo> {
    procs.sort_by_key(|p| (p.start_time, p.pid));
    procs
}
