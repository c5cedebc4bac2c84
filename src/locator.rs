//! Target process resolution and reacquisition. Liveness is checked by
//! the sampler's own read, so nothing here refreshes a tracked pid.

use crate::collectors::{MetricSource, ProcessInfo};
use crate::error::{ConfigError, ResolveError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How the target is selected. Exactly one selector is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCriterion {
    Pid(u32),
    Name(String),
}

impl ProcessCriterion {
    pub fn from_selector(name: Option<&str>, pid: Option<u32>) -> Result<Self, ConfigError> {
        match (name, pid) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousSelector),
            (None, None) => Err(ConfigError::MissingSelector),
            (Some(n), None) if n.trim().is_empty() => Err(ConfigError::MissingSelector),
            (Some(n), None) => Ok(ProcessCriterion::Name(n.to_string())),
            (None, Some(p)) => Ok(ProcessCriterion::Pid(p)),
        }
    }
}

/// What happens when the tracked process exits mid-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Stop,
    /// Re-resolve by name and keep sampling under the new pid.
    Reacquire,
}

/// A resolved process. `start_time` guards against pid reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    pub start_time: u64,
}

impl From<ProcessInfo> for ProcessHandle {
    fn from(p: ProcessInfo) -> Self {
        Self {
            pid: p.pid,
            name: p.name,
            start_time: p.start_time,
        }
    }
}

pub struct ProcessLocator {
    criterion: ProcessCriterion,
    policy: RestartPolicy,
}

impl ProcessLocator {
    pub fn new(criterion: ProcessCriterion, policy: RestartPolicy) -> Self {
        Self { criterion, policy }
    }

    pub fn criterion(&self) -> &ProcessCriterion {
        &self.criterion
    }

    /// By pid: the pid must exist now. By name: first match in creation order.
    pub fn resolve<S: MetricSource>(&self, source: &mut S) -> Result<ProcessHandle, ResolveError> {
        let handle = match &self.criterion {
            ProcessCriterion::Pid(pid) => source
                .lookup(*pid)
                .map(ProcessHandle::from)
                .ok_or(ResolveError::PidNotFound(*pid))?,
            ProcessCriterion::Name(name) => source
                .list_processes()
                .into_iter()
                .find(|p| &p.name == name)
                .map(ProcessHandle::from)
                .ok_or_else(|| ResolveError::NameNotFound(name.clone()))?,
        };
        debug!(pid = handle.pid, name = %handle.name, "process resolved");
        Ok(handle)
    }

    /// After termination: a replacement handle under `Reacquire`, else `None`.
    pub fn reacquire<S: MetricSource>(&self, source: &mut S) -> Option<ProcessHandle> {
        if self.policy != RestartPolicy::Reacquire {
            return None;
        }
        if !matches!(self.criterion, ProcessCriterion::Name(_)) {
            return None;
        }
        let handle = self.resolve(source).ok()?;
        info!(pid = handle.pid, name = %handle.name, "process reacquired");
        Some(handle)
    }
}
