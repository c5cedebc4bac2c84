//! Inet connection count for one process (TCP and UDP, v4 and v6).
//! Matches the socket inodes held in `/proc/<pid>/fd` against the kernel's
//! socket tables.

use super::FieldError;

#[cfg(target_os = "linux")]
const SOCKET_TABLES: [&str; 4] = ["tcp", "tcp6", "udp", "udp6"];

#[cfg(target_os = "linux")]
pub fn count_connections(pid: u32) -> Result<u64, FieldError> {
    use std::collections::HashSet;

    let mut inodes = HashSet::new();
    for entry in std::fs::read_dir(format!("/proc/{}/fd", pid))?.flatten() {
        if let Ok(link) = std::fs::read_link(entry.path()) {
            if let Some(inode) = socket_inode(&link.to_string_lossy()) {
                inodes.insert(inode);
            }
        }
    }
    if inodes.is_empty() {
        return Ok(0);
    }

    let mut count = 0u64;
    for table in SOCKET_TABLES {
        // Tables missing (no IPv6) simply contribute nothing.
        let Ok(content) = std::fs::read_to_string(format!("/proc/{}/net/{}", pid, table)) else {
            continue;
        };
        count += table_inodes(&content)
            .filter(|inode| inodes.contains(inode))
            .count() as u64;
    }
    Ok(count)
}

#[cfg(not(target_os = "linux"))]
pub fn count_connections(_pid: u32) -> Result<u64, FieldError> {
    Err(FieldError::Unsupported)
}

/// `socket:[12345]` -> 12345
pub(crate) fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

/// Inode column (10th) of each row of a `/proc/net/{tcp,udp}*` table.
pub(crate) fn table_inodes(content: &str) -> impl Iterator<Item = u64> + '_ {
    content
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(9)?.parse().ok())
}
