use serde::{Deserialize, Serialize};

/// Point-in-time memory usage of this process, in whole megabytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Resident set size.
    pub rss_mb: u64,
    /// Total mapped virtual memory.
    pub vsize_mb: u64,
}

impl MemorySnapshot {
    pub fn growth_mb(before: MemorySnapshot, after: MemorySnapshot) -> i64 {
        after.rss_mb as i64 - before.rss_mb as i64
    }
}

/// Captures the current process memory usage.
///
/// Reads `/proc/self/status` on Linux. On other platforms this returns a
/// zeroed snapshot; the monitor and health surface degrade gracefully.
pub fn snapshot() -> MemorySnapshot {
    read_proc_status().unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn read_proc_status() -> Option<MemorySnapshot> {
    let contents = std::fs::read_to_string("/proc/self/status").ok()?;
    let mut rss_kb = None;
    let mut vsize_kb = None;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            rss_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            vsize_kb = parse_kb(rest);
        }
        if rss_kb.is_some() && vsize_kb.is_some() {
            break;
        }
    }
    Some(MemorySnapshot {
        rss_mb: rss_kb? / 1024,
        vsize_mb: vsize_kb? / 1024,
    })
}

#[cfg(target_os = "linux")]
fn parse_kb(rest: &str) -> Option<u64> {
    // Lines look like "VmRSS:      1234 kB".
    rest.trim().split_whitespace().next()?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn read_proc_status() -> Option<MemorySnapshot> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn snapshot_reports_nonzero_memory() {
        let snap = snapshot();
        assert!(snap.vsize_mb > 0);
        assert!(snap.vsize_mb >= snap.rss_mb);
    }

    #[test]
    fn growth_is_signed() {
        let before = MemorySnapshot {
            rss_mb: 10,
            vsize_mb: 100,
        };
        let after = MemorySnapshot {
            rss_mb: 8,
            vsize_mb: 100,
        };
        assert_eq!(MemorySnapshot::growth_mb(before, after), -2);
    }
}
