//! procwatch: process resource sampler with statistical anomaly detection
//! and system-log audit correlation.
//!
//! Modular structure:
//! - [`locator`]: resolve the target process by name or pid, track liveness
//! - [`collectors`]: OS metric sources (sysinfo, `/proc`)
//! - [`sampler`]: one consistent sample per tick, tick pacing
//! - [`series`]: samples and the append-only series of a run
//! - [`detector`]: baselines, fixed and statistical classification
//! - [`audit`]: log windows, log sources, audit entries
//! - [`storage`]: series, anomaly and audit files
//! - [`monitor`]: the sampling run
//! - [`logging`]: tracing setup

pub mod audit;
pub mod collectors;
pub mod config;
pub mod detector;
pub mod error;
pub mod locator;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod sampler;
pub mod series;
pub mod storage;

pub use audit::{AuditCorrelator, AuditEntry, LogSource, SystemLogSource, NO_LOGS_SENTINEL};
pub use collectors::{MetricSource, SysinfoSource};
pub use config::MonitorConfig;
pub use detector::{Anomaly, AnomalyDetector, Baseline, Metric, ThresholdPolicy};
pub use error::AgentError;
pub use locator::{ProcessCriterion, ProcessLocator};
pub use logging::StructuredLogger;
pub use monitor::Monitor;
pub use sampler::MetricSampler;
pub use series::{Sample, Series};
