//! Config load and validation.

use procwatch::config::{ConfigWarning, MonitorConfig, MAX_WINDOW_SECS};
use procwatch::detector::{HourWindow, ThresholdPolicy};
use procwatch::error::ConfigError;
use procwatch::locator::{ProcessCriterion, RestartPolicy};
use std::fs;
use std::path::Path;

fn named(name: &str) -> MonitorConfig {
    let mut c = MonitorConfig::default();
    c.target.name = Some(name.into());
    c
}

#[test]
fn missing_file_yields_defaults() {
    let c = MonitorConfig::load(Path::new("does-not-exist.json")).unwrap();
    assert_eq!(c.sampling.interval_secs, 1.0);
    assert_eq!(c.audit.lead_secs, 10);
    assert_eq!(c.audit.timeout_secs, 15);
    assert_eq!(c.target.restart, RestartPolicy::Stop);
    assert!(c.output.series_path.is_none());
}

#[test]
fn file_values_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procwatch.json");
    fs::write(
        &path,
        r#"{
            "target": {"pid": 1234},
            "sampling": {"interval_secs": 0.5, "max_samples": 20},
            "detection": {"business_hours": {"start_hour": 9, "end_hour": 17}},
            "output": {"series_path": "out/series.csv"}
        }"#,
    )
    .unwrap();
    let c = MonitorConfig::load(&path).unwrap();
    assert_eq!(c.criterion().unwrap(), ProcessCriterion::Pid(1234));
    assert_eq!(c.sampling.max_samples, Some(20));
    assert_eq!(c.detection.business_hours, Some(HourWindow::new(9, 17)));
    assert!(c.validate().unwrap().is_empty());
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        MonitorConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn empty_name_counts_as_missing() {
    assert!(matches!(
        named("  ").validate(),
        Err(ConfigError::MissingSelector)
    ));
}

#[test]
fn interval_must_be_positive() {
    for bad in [0.0, -1.0, f64::NAN] {
        let mut c = named("x");
        c.sampling.interval_secs = bad;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidInterval(_))));
    }
}

#[test]
fn tiny_interval_only_warns() {
    let mut c = named("x");
    c.sampling.interval_secs = 0.05;
    let warnings = c.validate().unwrap();
    assert_eq!(
        warnings,
        vec![ConfigWarning::IntervalBelowFloor {
            interval_secs: 0.05
        }]
    );
}

#[test]
fn reacquire_needs_a_name() {
    let mut c = MonitorConfig::default();
    c.target.pid = Some(10);
    c.target.restart = RestartPolicy::Reacquire;
    assert!(matches!(c.validate(), Err(ConfigError::ReacquireWithoutName)));
}

#[test]
fn negative_multiplier_is_rejected() {
    let mut c = named("x");
    c.detection.rules[1].policy = ThresholdPolicy::Statistical {
        multiplier: -1.0,
        floor: None,
    };
    assert!(matches!(
        c.validate_analysis(),
        Err(ConfigError::InvalidValue { field: "detection.rules.multiplier", .. })
    ));
}

#[test]
fn zero_max_samples_is_rejected() {
    let mut c = named("x");
    c.sampling.max_samples = Some(0);
    assert!(c.validate().is_err());
}

#[test]
fn audit_window_is_bounded_to_a_day() {
    let mut c = named("x");
    c.audit.lead_secs = MAX_WINDOW_SECS;
    c.audit.lag_secs = MAX_WINDOW_SECS;
    assert!(c.validate_analysis().is_ok());

    c.audit.lead_secs = u64::MAX;
    assert!(matches!(
        c.validate_analysis(),
        Err(ConfigError::InvalidValue { field: "audit.lead_secs", .. })
    ));
    c.audit.lead_secs = 5;
    c.audit.lag_secs = MAX_WINDOW_SECS + 1;
    assert!(matches!(
        c.validate_analysis(),
        Err(ConfigError::InvalidValue { field: "audit.lag_secs", .. })
    ));
}

#[test]
fn log_command_needs_a_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procwatch.json");
    fs::write(
        &path,
        r#"{"target": {"name": "nginx"}, "audit": {"log_command": ["/usr/local/bin/logs", "--json"]}}"#,
    )
    .unwrap();
    let mut c = MonitorConfig::load(&path).unwrap();
    assert_eq!(
        c.audit.log_command.as_deref(),
        Some(&["/usr/local/bin/logs".to_string(), "--json".to_string()][..])
    );
    assert!(c.validate_analysis().is_ok());

    for bad in [vec![], vec![" ".to_string()]] {
        c.audit.log_command = Some(bad);
        assert!(matches!(
            c.validate_analysis(),
            Err(ConfigError::InvalidValue { field: "audit.log_command", .. })
        ));
    }
}
