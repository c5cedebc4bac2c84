//! Per-tick metric sampling and tick pacing.

use crate::collectors::{FieldError, MetricSource, RawMetrics};
use crate::locator::ProcessHandle;
use crate::series::{round2, Sample};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Counts of fields that degraded to zero during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DegradationStats {
    pub io_unavailable: u64,
    pub connections_unavailable: u64,
}

/// The process exited, or its pid now belongs to another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGone;

#[derive(Default)]
pub struct MetricSampler {
    /// (pid, start_time) whose CPU interval has been opened.
    primed: Option<(u32, u64)>,
    stats: DegradationStats,
}

impl MetricSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DegradationStats {
        self.stats
    }

    fn is_primed(&self, handle: &ProcessHandle) -> bool {
        self.primed == Some((handle.pid, handle.start_time))
    }

    /// Open the CPU measurement interval for a freshly acquired handle.
    /// The first sample should follow one full interval later.
    pub fn prime<S: MetricSource>(
        &mut self,
        source: &mut S,
        handle: &ProcessHandle,
    ) -> Result<(), ProcessGone> {
        read_live(source, handle)?;
        self.primed = Some((handle.pid, handle.start_time));
        Ok(())
    }

    /// Read one sample. This read is also the liveness check: a vanished
    /// pid, or a pid now held by another process, is `ProcessGone`.
    /// Optional fields that fail degrade to zero; CPU is zero on the first
    /// read of an unprimed handle.
    pub fn sample<S: MetricSource>(
        &mut self,
        source: &mut S,
        handle: &ProcessHandle,
        at: NaiveDateTime,
    ) -> Result<Sample, ProcessGone> {
        let raw = read_live(source, handle)?;

        let cpu = if self.is_primed(handle) {
            raw.cpu_percent
        } else {
            self.primed = Some((handle.pid, handle.start_time));
            0.0
        };

        let (io_reads, io_writes) = match raw.io {
            Ok(c) => (c.read_count, c.write_count),
            Err(e) => {
                self.stats.io_unavailable += 1;
                report_degraded("io_counters", handle.pid, &e, self.stats.io_unavailable);
                (0, 0)
            }
        };
        let network_connections = match raw.connections {
            Ok(n) => n,
            Err(e) => {
                self.stats.connections_unavailable += 1;
                report_degraded(
                    "network_connections",
                    handle.pid,
                    &e,
                    self.stats.connections_unavailable,
                );
                0
            }
        };

        Ok(Sample {
            timestamp: at,
            process_id: handle.pid,
            process_name: handle.name.clone(),
            cpu_usage_percent: round2(cpu.max(0.0)),
            memory_usage_percent: round2(raw.memory_percent.max(0.0)),
            memory_usage_mb: round2(raw.memory_rss_bytes as f64 / BYTES_PER_MB),
            io_reads,
            io_writes,
            network_connections,
        })
    }
}

fn read_live<S: MetricSource>(
    source: &mut S,
    handle: &ProcessHandle,
) -> Result<RawMetrics, ProcessGone> {
    source
        .read_metrics(handle.pid)
        .filter(|raw| raw.start_time == handle.start_time)
        .ok_or(ProcessGone)
}

fn report_degraded(field: &'static str, pid: u32, err: &FieldError, count: u64) {
    if count == 1 {
        warn!(field, pid, error = %err, "metric unavailable, recording zero");
    } else {
        debug!(field, pid, error = %err, count, "metric unavailable");
    }
}

/// Fixed-interval pacing: each tick sleeps only what is left of the interval.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs.max(0.0)))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `max(0, interval - elapsed)`
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}
