//! System log retrieval for one process over a time window.
//!
//! The log facility is untrusted: every query runs under a timeout and the
//! child is killed when it expires.

use crate::error::LogQueryError;
use crate::series::format_timestamp;
use chrono::NaiveDateTime;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// `query(process_id, start_time, end_time) -> text | error`
pub trait LogSource {
    fn query(
        &self,
        pid: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<String, LogQueryError>;
}

impl<L: LogSource + ?Sized> LogSource for &L {
    fn query(
        &self,
        pid: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<String, LogQueryError> {
        (**self).query(pid, start, end)
    }
}

/// journalctl prints this (exit 0) when the window is empty.
const JOURNAL_NO_ENTRIES: &str = "-- No entries --";

/// Which program answers a query.
#[derive(Debug, Clone)]
enum QueryCommand {
    /// `log show` on macOS, `journalctl` on Linux.
    Platform,
    /// `program args... <pid> <start> <end>`
    Custom { program: String, args: Vec<String> },
}

/// Queries the system log through an external program, one child per query.
pub struct SystemLogSource {
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
    command: QueryCommand,
}

impl SystemLogSource {
    /// The platform log tool.
    pub fn new(timeout: Duration) -> std::io::Result<Self> {
        Self::build(timeout, QueryCommand::Platform)
    }

    /// A custom program. The pid and the window start and end are appended
    /// to `args`; its stdout is taken as the log text.
    pub fn with_command(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        Self::build(
            timeout,
            QueryCommand::Custom {
                program: program.into(),
                args,
            },
        )
    }

    fn build(timeout: Duration, command: QueryCommand) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        Ok(Self {
            runtime,
            timeout,
            command,
        })
    }

    fn command(&self, pid: u32, start: &str, end: &str) -> Option<Command> {
        match &self.command {
            QueryCommand::Platform => platform_command(pid, start, end),
            QueryCommand::Custom { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(pid.to_string()).arg(start).arg(end);
                Some(cmd)
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_command(pid: u32, start: &str, end: &str) -> Option<Command> {
    let mut cmd = Command::new("log");
    cmd.arg("show")
        .arg("--predicate")
        .arg(format!("processID == {}", pid))
        .arg("--info")
        .arg("--start")
        .arg(start)
        .arg("--end")
        .arg(end)
        .arg("--style")
        .arg("syslog");
    Some(cmd)
}

#[cfg(target_os = "linux")]
fn platform_command(pid: u32, start: &str, end: &str) -> Option<Command> {
    let mut cmd = Command::new("journalctl");
    cmd.arg(format!("_PID={}", pid))
        .arg("--since")
        .arg(start)
        .arg("--until")
        .arg(end)
        .arg("--no-pager")
        .arg("--output")
        .arg("short-iso");
    Some(cmd)
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_command(_pid: u32, _start: &str, _end: &str) -> Option<Command> {
    None
}

impl LogSource for SystemLogSource {
    fn query(
        &self,
        pid: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<String, LogQueryError> {
        let (start, end) = (format_timestamp(&start), format_timestamp(&end));
        let mut cmd = self
            .command(pid, &start, &end)
            .ok_or(LogQueryError::Unsupported)?;
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        debug!(pid, %start, %end, "querying system log");

        let timeout = self.timeout;
        let output = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, cmd.output()).await });
        let output = match output {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return Err(LogQueryError::Unavailable(e.to_string())),
            Err(_) => return Err(LogQueryError::Timeout(timeout)),
        };
        if !output.status.success() {
            return Err(LogQueryError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text == JOURNAL_NO_ENTRIES {
            return Ok(String::new());
        }
        Ok(text)
    }
}
