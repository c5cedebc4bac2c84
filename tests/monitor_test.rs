//! Sampling runs against a scripted process table.

use chrono::{NaiveDate, NaiveDateTime};
use procwatch::collectors::{
    creation_order, FieldError, IoCounters, MetricSource, ProcessInfo, RawMetrics,
};
use procwatch::config::{DetectionConfig, DetectionRule, MonitorConfig};
use procwatch::detector::{Metric, ThresholdPolicy};
use procwatch::error::{AgentError, ConfigError, ResolveError};
use procwatch::locator::{ProcessCriterion, ProcessLocator, RestartPolicy};
use procwatch::locator::ProcessHandle;
use procwatch::monitor::{Monitor, StopReason};
use procwatch::sampler::{MetricSampler, ProcessGone};
use procwatch::storage::{self, SeriesWriter};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// Each process answers a fixed number of metric reads, then exits.
#[derive(Default)]
struct FakeProcs {
    procs: Vec<ProcessInfo>,
    reads_left: HashMap<u32, u32>,
    cpu: f64,
    io_denied: bool,
}

impl FakeProcs {
    fn with(mut self, pid: u32, name: &str, start_time: u64, reads: u32) -> Self {
        self.procs.push(ProcessInfo {
            pid,
            name: name.into(),
            start_time,
        });
        self.reads_left.insert(pid, reads);
        self
    }
}

impl MetricSource for FakeProcs {
    fn list_processes(&mut self) -> Vec<ProcessInfo> {
        creation_order(self.procs.clone())
    }

    fn lookup(&mut self, pid: u32) -> Option<ProcessInfo> {
        self.procs.iter().find(|p| p.pid == pid).cloned()
    }

    fn read_metrics(&mut self, pid: u32) -> Option<RawMetrics> {
        let start_time = self.lookup(pid)?.start_time;
        let left = self.reads_left.get_mut(&pid)?;
        if *left == 0 {
            return None;
        }
        *left -= 1;
        if *left == 0 {
            self.procs.retain(|p| p.pid != pid);
        }
        Some(RawMetrics {
            start_time,
            cpu_percent: self.cpu,
            memory_percent: 1.234,
            memory_rss_bytes: 3 * 1024 * 1024,
            io: if self.io_denied {
                Err(FieldError::PermissionDenied)
            } else {
                Ok(IoCounters {
                    read_count: 11,
                    write_count: 22,
                })
            },
            connections: Err(FieldError::Unsupported),
        })
    }
}

fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 9)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap()
}

fn config_for(name: &str) -> MonitorConfig {
    let mut c = MonitorConfig::default();
    c.target.name = Some(name.into());
    c.sampling.interval_secs = 0.01;
    c
}

fn run(
    config: &MonitorConfig,
    source: FakeProcs,
    stop: bool,
) -> Result<(procwatch::monitor::MonitorRun, String), AgentError> {
    let mut monitor = Monitor::new(config, source)?.with_clock(fixed_clock);
    let mut writer = SeriesWriter::new(Vec::new())?;
    let run = monitor.run(&mut writer, &AtomicBool::new(stop))?;
    let text = String::from_utf8(writer.into_inner()?).unwrap();
    Ok((run, text))
}

#[test]
fn process_exit_ends_the_run_gracefully() {
    // one read primes CPU, the remaining three become samples
    let source = FakeProcs {
        cpu: 12.346,
        ..Default::default()
    }
    .with(40, "worker", 100, 4);
    let (run, text) = run(&config_for("worker"), source, false).unwrap();

    assert_eq!(run.summary.stop_reason, StopReason::ProcessExited);
    assert_eq!(run.summary.samples, 3);
    assert_eq!(run.series.len(), 3);

    let first = &run.series.samples()[0];
    assert_eq!(first.process_id, 40);
    assert_eq!(first.cpu_usage_percent, 12.35);
    assert_eq!(first.memory_usage_percent, 1.23);
    assert_eq!(first.memory_usage_mb, 3.0);
    assert_eq!((first.io_reads, first.io_writes), (11, 22));
    assert_eq!(first.timestamp, fixed_clock());

    // the file holds the same records
    let on_disk = storage::read_series(text.as_bytes()).unwrap();
    assert_eq!(on_disk, run.series.samples());
}

#[test]
fn unavailable_fields_degrade_to_zero() {
    let source = FakeProcs {
        io_denied: true,
        ..Default::default()
    }
    .with(7, "daemon", 1, 3);
    let (run, _) = run(&config_for("daemon"), source, false).unwrap();

    assert_eq!(run.summary.samples, 2);
    for s in run.series.samples() {
        assert_eq!((s.io_reads, s.io_writes, s.network_connections), (0, 0, 0));
    }
    assert_eq!(run.summary.degraded.io_unavailable, 2);
    assert_eq!(run.summary.degraded.connections_unavailable, 2);
}

#[test]
fn max_samples_stops_early() {
    let source = FakeProcs::default().with(8, "busy", 1, 100);
    let mut config = config_for("busy");
    config.sampling.max_samples = Some(5);
    let (run, _) = run(&config, source, false).unwrap();
    assert_eq!(run.summary.stop_reason, StopReason::MaxSamples);
    assert_eq!(run.summary.samples, 5);
}

#[test]
fn stop_flag_interrupts_before_the_first_tick() {
    let source = FakeProcs::default().with(8, "busy", 1, 100);
    let (run, text) = run(&config_for("busy"), source, true).unwrap();
    assert_eq!(run.summary.stop_reason, StopReason::Interrupted);
    assert_eq!(run.summary.samples, 0);
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn reacquire_follows_the_name_to_a_new_pid() {
    let source = FakeProcs::default()
        .with(20, "api", 200, 3)
        .with(10, "api", 100, 3);
    let mut config = config_for("api");
    config.target.restart = RestartPolicy::Reacquire;
    let (run, _) = run(&config, source, false).unwrap();

    let pids: Vec<_> = run.series.samples().iter().map(|s| s.process_id).collect();
    assert_eq!(pids, vec![10, 10, 20, 20]);
    assert_eq!(run.summary.reacquisitions, 1);
    assert_eq!(run.summary.stop_reason, StopReason::ProcessExited);
}

#[test]
fn without_reacquire_a_restart_ends_the_run() {
    let source = FakeProcs::default()
        .with(20, "api", 200, 3)
        .with(10, "api", 100, 3);
    let (run, _) = run(&config_for("api"), source, false).unwrap();
    assert!(run.series.samples().iter().all(|s| s.process_id == 10));
    assert_eq!(run.summary.reacquisitions, 0);
}

#[test]
fn online_detection_counts_flagged_samples() {
    let source = FakeProcs {
        cpu: 80.0,
        ..Default::default()
    }
    .with(5, "hot", 1, 4);
    let mut config = config_for("hot");
    config.sampling.online_detection = true;
    config.detection = DetectionConfig {
        rules: vec![DetectionRule {
            metric: Metric::Cpu,
            policy: ThresholdPolicy::Fixed { limit: 50.0 },
        }],
        business_hours: None,
    };
    let (run, _) = run(&config, source, false).unwrap();
    assert_eq!(run.summary.samples, 3);
    assert_eq!(run.summary.online_anomalies, 3);
}

#[test]
fn missing_target_fails_before_sampling() {
    let config = config_for("nope");
    let mut monitor = Monitor::new(&config, FakeProcs::default()).unwrap();
    let err = monitor.attach().unwrap_err();
    assert!(matches!(err, ResolveError::NameNotFound(ref n) if n == "nope"));

    let mut by_pid = MonitorConfig::default();
    by_pid.target.pid = Some(999);
    let mut monitor = Monitor::new(&by_pid, FakeProcs::default()).unwrap();
    assert!(matches!(monitor.attach(), Err(ResolveError::PidNotFound(999))));
}

#[test]
fn attach_then_run_uses_the_attached_process() {
    let config = config_for("w");
    let mut monitor = Monitor::new(&config, FakeProcs::default().with(3, "w", 1, 2))
        .unwrap()
        .with_clock(fixed_clock);
    assert_eq!(monitor.attach().unwrap().pid, 3);
    let mut writer = SeriesWriter::new(Vec::new()).unwrap();
    let run = monitor.run(&mut writer, &AtomicBool::new(false)).unwrap();
    assert_eq!(run.summary.samples, 1);
}

#[test]
fn selector_must_be_unambiguous() {
    let mut both = MonitorConfig::default();
    both.target.name = Some("x".into());
    both.target.pid = Some(1);
    assert!(matches!(
        Monitor::new(&both, FakeProcs::default()),
        Err(ConfigError::AmbiguousSelector)
    ));
    assert!(matches!(
        Monitor::new(&MonitorConfig::default(), FakeProcs::default()),
        Err(ConfigError::MissingSelector)
    ));
}

#[test]
fn name_resolution_picks_the_oldest_match() {
    let mut source = FakeProcs::default()
        .with(300, "db", 30, 1)
        .with(100, "db", 10, 1)
        .with(50, "other", 1, 1);
    let locator = ProcessLocator::new(ProcessCriterion::Name("db".into()), RestartPolicy::Stop);
    let handle = locator.resolve(&mut source).unwrap();
    assert_eq!(handle.pid, 100);
    assert_eq!(handle.start_time, 10);
    // stop policy never reacquires
    assert!(locator.reacquire(&mut source).is_none());
}

#[test]
fn reused_pid_is_not_the_tracked_process() {
    let mut source = FakeProcs::default().with(3, "w", 1, 10);
    let stale = ProcessHandle {
        pid: 3,
        name: "w".into(),
        start_time: 999,
    };
    let mut sampler = MetricSampler::new();
    assert_eq!(sampler.prime(&mut source, &stale), Err(ProcessGone));
    assert_eq!(
        sampler.sample(&mut source, &stale, fixed_clock()),
        Err(ProcessGone)
    );
}

/// Behaves like a kernel CPU counter: usage is only known for a pid left
/// alone since its previous refresh, and any refresh (listing, lookup or
/// read) restarts that interval.
struct IntervalProcs {
    info: ProcessInfo,
    reads_left: u32,
    last_refresh: Option<Instant>,
}

/// Shortest interval that yields a CPU figure.
const CPU_WINDOW: Duration = Duration::from_millis(15);

impl IntervalProcs {
    fn new(pid: u32, name: &str, reads: u32) -> Self {
        Self {
            info: ProcessInfo {
                pid,
                name: name.into(),
                start_time: 5,
            },
            reads_left: reads,
            last_refresh: None,
        }
    }

    fn alive(&self, pid: u32) -> bool {
        pid == self.info.pid && self.reads_left > 0
    }

    fn refresh(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = self
            .last_refresh
            .map_or(Duration::ZERO, |t| now.duration_since(t));
        self.last_refresh = Some(now);
        elapsed
    }
}

impl MetricSource for IntervalProcs {
    fn list_processes(&mut self) -> Vec<ProcessInfo> {
        if !self.alive(self.info.pid) {
            return Vec::new();
        }
        self.refresh();
        vec![self.info.clone()]
    }

    fn lookup(&mut self, pid: u32) -> Option<ProcessInfo> {
        if !self.alive(pid) {
            return None;
        }
        self.refresh();
        Some(self.info.clone())
    }

    fn read_metrics(&mut self, pid: u32) -> Option<RawMetrics> {
        if !self.alive(pid) {
            return None;
        }
        self.reads_left -= 1;
        let elapsed = self.refresh();
        Some(RawMetrics {
            start_time: self.info.start_time,
            cpu_percent: if elapsed >= CPU_WINDOW { 40.0 } else { 0.0 },
            memory_percent: 1.0,
            memory_rss_bytes: 1024 * 1024,
            io: Ok(IoCounters::default()),
            connections: Ok(0),
        })
    }
}

#[test]
fn every_sample_measures_a_full_interval() {
    let mut config = config_for("spin");
    config.sampling.interval_secs = 0.03;
    let mut monitor = Monitor::new(&config, IntervalProcs::new(77, "spin", 4))
        .unwrap()
        .with_clock(fixed_clock);
    let mut writer = SeriesWriter::new(Vec::new()).unwrap();
    let run = monitor.run(&mut writer, &AtomicBool::new(false)).unwrap();

    // the priming read is not stored; the three reads after it are
    let cpus: Vec<_> = run
        .series
        .samples()
        .iter()
        .map(|s| s.cpu_usage_percent)
        .collect();
    assert_eq!(cpus, vec![40.0, 40.0, 40.0]);
    assert_eq!(run.summary.stop_reason, StopReason::ProcessExited);
}

