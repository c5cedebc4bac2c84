//! The sampling run: resolve the target, sample it on a fixed interval,
//! append every sample to the in-memory series and the series file.
//!
//! Single-threaded blocking loop. It ends on interrupt, on process exit
//! (unless the target can be reacquired by name), or after `max_samples`.

use crate::collectors::MetricSource;
use crate::config::MonitorConfig;
use crate::detector::AnomalyDetector;
use crate::error::{AgentError, ConfigError, ResolveError};
use crate::locator::{ProcessHandle, ProcessLocator};
use crate::sampler::{DegradationStats, MetricSampler, Pacer, ProcessGone};
use crate::series::{format, Series};
use crate::storage::SeriesWriter;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest uninterrupted sleep; bounds interrupt latency.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Interrupted,
    ProcessExited,
    MaxSamples,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub samples: u64,
    pub stop_reason: StopReason,
    pub degraded: DegradationStats,
    pub online_anomalies: u64,
    pub reacquisitions: u64,
}

pub struct MonitorRun {
    pub series: Series,
    pub summary: RunSummary,
}

pub struct Monitor<'a, S: MetricSource> {
    config: &'a MonitorConfig,
    source: S,
    locator: ProcessLocator,
    sampler: MetricSampler,
    online: Option<AnomalyDetector>,
    pacer: Pacer,
    clock: fn() -> NaiveDateTime,
    handle: Option<ProcessHandle>,
}

impl<'a, S: MetricSource> Monitor<'a, S> {
    pub fn new(config: &'a MonitorConfig, source: S) -> Result<Self, ConfigError> {
        let locator = ProcessLocator::new(config.criterion()?, config.target.restart);
        let online = config
            .sampling
            .online_detection
            .then(|| AnomalyDetector::new(config.detection.clone()));
        Ok(Self {
            config,
            source,
            locator,
            sampler: MetricSampler::new(),
            online,
            pacer: Pacer::from_secs_f64(config.sampling.interval_secs),
            clock: format::now,
            handle: None,
        })
    }

    /// Replace the wall clock used for sample timestamps.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve the target ahead of `run`, so a missing process is reported
    /// before any output is created.
    pub fn attach(&mut self) -> Result<&ProcessHandle, ResolveError> {
        let handle = self.locator.resolve(&mut self.source)?;
        Ok(&*self.handle.insert(handle))
    }

    /// Run until a stop condition. Fails only at startup (target not found)
    /// or when the series file cannot be written.
    pub fn run<W: Write>(
        &mut self,
        writer: &mut SeriesWriter<W>,
        stop: &AtomicBool,
    ) -> Result<MonitorRun, AgentError> {
        let mut handle = match self.handle.take() {
            Some(h) => h,
            None => self.locator.resolve(&mut self.source)?,
        };
        info!(
            pid = handle.pid,
            name = %handle.name,
            interval_secs = self.pacer.interval().as_secs_f64(),
            "monitoring started"
        );

        let mut series = Series::new();
        let mut online_anomalies = 0u64;
        let mut reacquisitions = 0u64;
        let mut primed = self.sampler.prime(&mut self.source, &handle).is_ok();
        if primed {
            // the first sample covers one full interval of CPU time
            sleep_interruptible(self.pacer.interval(), stop);
        }

        let stop_reason = loop {
            if stop.load(Ordering::Relaxed) {
                break StopReason::Interrupted;
            }
            let tick = Instant::now();

            let sample = if primed {
                self.sampler.sample(&mut self.source, &handle, (self.clock)())
            } else {
                Err(ProcessGone)
            };

            match sample {
                Ok(sample) => {
                    let stored = series.push(sample);
                    writer.append(stored)?;

                    if let Some(detector) = &self.online {
                        for a in detector.newest_anomalies(series.snapshot()) {
                            online_anomalies += 1;
                            warn!(
                                pid = a.sample.process_id,
                                metric = %a.metric,
                                value = a.value,
                                direction = a.direction.as_str(),
                                upper = a.bounds.upper,
                                "anomalous sample"
                            );
                        }
                    }

                    if let Some(max) = self.config.sampling.max_samples {
                        if series.len() as u64 >= max {
                            break StopReason::MaxSamples;
                        }
                    }
                }
                Err(_) => {
                    info!(pid = handle.pid, name = %handle.name, "tracked process exited");
                    match self.locator.reacquire(&mut self.source) {
                        Some(next) => {
                            handle = next;
                            reacquisitions += 1;
                            primed = self.sampler.prime(&mut self.source, &handle).is_ok();
                        }
                        None => break StopReason::ProcessExited,
                    }
                }
            }

            sleep_interruptible(self.pacer.remaining(tick.elapsed()), stop);
        };

        writer.flush()?;
        let summary = RunSummary {
            samples: series.len() as u64,
            stop_reason,
            degraded: self.sampler.stats(),
            online_anomalies,
            reacquisitions,
        };
        info!(
            samples = summary.samples,
            stop_reason = ?summary.stop_reason,
            io_unavailable = summary.degraded.io_unavailable,
            connections_unavailable = summary.degraded.connections_unavailable,
            "monitoring finished"
        );
        Ok(MonitorRun { series, summary })
    }
}

/// Sleep `total`, waking early when `stop` is raised.
fn sleep_interruptible(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        std::thread::sleep(left.min(SLEEP_SLICE));
    }
}
