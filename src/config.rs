//! Monitor configuration: JSON file, overridden by command-line flags,
//! validated once before the run starts and read-only afterwards.

use crate::detector::{HourWindow, Metric, ThresholdPolicy};
use crate::error::ConfigError;
use crate::locator::{ProcessCriterion, RestartPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Intervals below this are accepted with a warning.
pub const MIN_INTERVAL_SECS: f64 = 0.1;

/// Upper bound for the audit lead and lag.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Which process to follow
    pub target: TargetConfig,
    /// Tick interval and run limits
    pub sampling: SamplingConfig,
    /// Anomaly rules
    pub detection: DetectionConfig,
    /// Log window and query bounds
    pub audit: AuditConfig,
    /// Output locations
    pub output: OutputConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub name: Option<String>,
    pub pid: Option<u32>,
    /// Behavior when the process exits mid-run
    pub restart: RestartPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between ticks
    pub interval_secs: f64,
    /// Stop after this many samples
    pub max_samples: Option<u64>,
    /// Classify each new sample as it arrives
    pub online_detection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRule {
    pub metric: Metric,
    #[serde(flatten)]
    pub policy: ThresholdPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub rules: Vec<DetectionRule>,
    /// Also evaluate statistical rules against a baseline of these hours only
    pub business_hours: Option<HourWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Seconds of log before the anomaly
    pub lead_secs: u64,
    /// Seconds of log after the anomaly
    pub lag_secs: u64,
    /// Upper bound for one log query
    pub timeout_secs: u64,
    /// Program and arguments used instead of the platform log tool; the
    /// pid and the window start and end are appended
    pub log_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Series file written during the run
    pub series_path: Option<PathBuf>,
    /// Directory for anomaly and audit reports
    pub report_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1.0,
            max_samples: None,
            online_detection: false,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                DetectionRule {
                    metric: Metric::Cpu,
                    policy: ThresholdPolicy::Fixed { limit: 50.0 },
                },
                DetectionRule {
                    metric: Metric::Cpu,
                    policy: ThresholdPolicy::Statistical {
                        multiplier: 2.0,
                        floor: Some(5.0),
                    },
                },
                DetectionRule {
                    metric: Metric::MemoryPercent,
                    policy: ThresholdPolicy::Statistical {
                        multiplier: 2.0,
                        floor: None,
                    },
                },
            ],
            business_hours: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            lead_secs: 10,
            lag_secs: 10,
            timeout_secs: 15,
            log_command: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Non-fatal configuration findings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    IntervalBelowFloor { interval_secs: f64 },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::IntervalBelowFloor { interval_secs } => write!(
                f,
                "sampling interval {}s is below {}s; samples may be noisy and costly",
                interval_secs, MIN_INTERVAL_SECS
            ),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl MonitorConfig {
    /// Load from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn criterion(&self) -> Result<ProcessCriterion, ConfigError> {
        ProcessCriterion::from_selector(self.target.name.as_deref(), self.target.pid)
    }

    /// Check the monitoring settings. Warnings do not stop the run.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let criterion = self.criterion()?;
        if self.target.restart == RestartPolicy::Reacquire
            && !matches!(criterion, ProcessCriterion::Name(_))
        {
            return Err(ConfigError::ReacquireWithoutName);
        }

        let interval = self.sampling.interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(interval));
        }
        if self.sampling.max_samples == Some(0) {
            return Err(invalid("sampling.max_samples", "must be at least 1"));
        }

        self.validate_analysis()?;

        let mut warnings = Vec::new();
        if interval < MIN_INTERVAL_SECS {
            warnings.push(ConfigWarning::IntervalBelowFloor {
                interval_secs: interval,
            });
        }
        Ok(warnings)
    }

    /// Check the detection and audit settings only (offline commands).
    pub fn validate_analysis(&self) -> Result<(), ConfigError> {
        for rule in &self.detection.rules {
            match rule.policy {
                ThresholdPolicy::Fixed { limit } if !limit.is_finite() => {
                    return Err(invalid("detection.rules.limit", format!("{}", limit)));
                }
                ThresholdPolicy::Statistical { multiplier, floor } => {
                    if !multiplier.is_finite() || multiplier < 0.0 {
                        return Err(invalid(
                            "detection.rules.multiplier",
                            format!("must be a non-negative number, got {}", multiplier),
                        ));
                    }
                    if floor.is_some_and(|f| !f.is_finite()) {
                        return Err(invalid("detection.rules.floor", "must be finite"));
                    }
                }
                _ => {}
            }
        }
        if let Some(w) = self.detection.business_hours {
            if !w.is_valid() {
                return Err(invalid("detection.business_hours", format!("{:?}", w)));
            }
        }
        if self.audit.timeout_secs == 0 {
            return Err(invalid("audit.timeout_secs", "must be at least 1"));
        }
        for (field, secs) in [
            ("audit.lead_secs", self.audit.lead_secs),
            ("audit.lag_secs", self.audit.lag_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(invalid(
                    field,
                    format!("{} exceeds the {}s limit", secs, MAX_WINDOW_SECS),
                ));
            }
        }
        if self
            .audit
            .log_command
            .as_ref()
            .is_some_and(|c| c.first().map_or(true, |p| p.trim().is_empty()))
        {
            return Err(invalid("audit.log_command", "must name a program"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_section_defaults() {
        let c: MonitorConfig =
            serde_json::from_str(r#"{"target":{"name":"nginx"},"sampling":{"interval_secs":2.5}}"#)
                .unwrap();
        assert_eq!(c.target.name.as_deref(), Some("nginx"));
        assert_eq!(c.sampling.interval_secs, 2.5);
        assert_eq!(c.audit.lead_secs, 10);
        assert_eq!(c.detection.rules.len(), 3);
    }

    #[test]
    fn rules_deserialize_flat() {
        let c: MonitorConfig = serde_json::from_str(
            r#"{"detection":{"rules":[
                {"metric":"cpu","mode":"statistical","multiplier":0.5,"floor":10.0},
                {"metric":"memory_mb","mode":"fixed","limit":512.0}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(
            c.detection.rules[0].policy,
            ThresholdPolicy::Statistical {
                multiplier: 0.5,
                floor: Some(10.0)
            }
        );
        assert_eq!(c.detection.rules[1].metric, Metric::MemoryMb);
    }
}
