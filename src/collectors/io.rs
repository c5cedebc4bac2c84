//! Lifetime read/write syscall counts for a process.

use super::FieldError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub read_count: u64,
    pub write_count: u64,
}

/// Parse `/proc/<pid>/io` (`syscr`/`syscw`).
#[cfg(target_os = "linux")]
pub fn read_io_counters(pid: u32) -> Result<IoCounters, FieldError> {
    let content = std::fs::read_to_string(format!("/proc/{}/io", pid))?;
    parse_proc_io(&content)
}

#[cfg(not(target_os = "linux"))]
pub fn read_io_counters(_pid: u32) -> Result<IoCounters, FieldError> {
    Err(FieldError::Unsupported)
}

pub(crate) fn parse_proc_io(content: &str) -> Result<IoCounters, FieldError> {
    let mut read_count = None;
    let mut write_count = None;
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("syscr:") {
            read_count = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("syscw:") {
            write_count = v.trim().parse().ok();
        }
    }
    match (read_count, write_count) {
        (Some(read_count), Some(write_count)) => Ok(IoCounters {
            read_count,
            write_count,
        }),
        _ => Err(FieldError::Other("malformed /proc io".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_syscall_counts() {
        let raw = "rchar: 100\nwchar: 20\nsyscr: 7\nsyscw: 3\nread_bytes: 0\n";
        assert_eq!(
            parse_proc_io(raw),
            Ok(IoCounters {
                read_count: 7,
                write_count: 3
            })
        );
    }

    #[test]
    fn truncated_file_is_an_error() {
        assert!(parse_proc_io("rchar: 1\n").is_err());
    }
}
