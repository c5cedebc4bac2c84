//! Process listing and CPU/memory readings (cross-platform via sysinfo).

use super::{creation_order, io, network, MetricSource, ProcessInfo, RawMetrics};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, System};

pub struct SysinfoSource {
    sys: System,
    total_memory: u64,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let total_memory = sys.total_memory();
        Self { sys, total_memory }
    }

    fn info(pid: Pid, proc_: &Process) -> ProcessInfo {
        ProcessInfo {
            pid: pid.as_u32(),
            name: proc_.name().to_string(),
            start_time: proc_.start_time(),
        }
    }

    fn live(proc_: &Process) -> bool {
        !matches!(proc_.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
    }
}

impl MetricSource for SysinfoSource {
    fn list_processes(&mut self) -> Vec<ProcessInfo> {
        self.sys.refresh_processes_specifics(ProcessRefreshKind::new());
        let procs = self
            .sys
            .processes()
            .iter()
            .filter(|(_, p)| Self::live(p))
            .map(|(pid, p)| Self::info(*pid, p))
            .collect();
        creation_order(procs)
    }

    fn lookup(&mut self, pid: u32) -> Option<ProcessInfo> {
        let pid = Pid::from_u32(pid);
        if !self
            .sys
            .refresh_process_specifics(pid, ProcessRefreshKind::new())
        {
            return None;
        }
        self.sys
            .process(pid)
            .filter(|p| Self::live(p))
            .map(|p| Self::info(pid, p))
    }

    fn read_metrics(&mut self, pid: u32) -> Option<RawMetrics> {
        let sys_pid = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::new().with_cpu().with_memory();
        if !self.sys.refresh_process_specifics(sys_pid, refresh) {
            return None;
        }
        let proc_ = self.sys.process(sys_pid).filter(|p| Self::live(p))?;
        let rss = proc_.memory();
        let memory_percent = if self.total_memory > 0 {
            rss as f64 / self.total_memory as f64 * 100.0
        } else {
            0.0
        };
        Some(RawMetrics {
            start_time: proc_.start_time(),
            cpu_percent: proc_.cpu_usage() as f64,
            memory_percent,
            memory_rss_bytes: rss,
            io: io::read_io_counters(pid),
            connections: network::count_connections(pid),
        })
    }
}
