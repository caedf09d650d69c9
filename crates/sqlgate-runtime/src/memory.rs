//! Peak resident memory of the process.

use std::fs;

/// `VmHWM` from `/proc/self/status`, in kilobytes. `None` off Linux.
pub fn peak_memory_kb() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

/// Peak memory formatted as `"<n> KB"`.
pub fn peak_memory_usage() -> Option<String> {
    peak_memory_kb().map(|kb| format!("{} KB", kb))
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}
