//! Formatted output helpers for the CLI.
//!
//! Renders planned `io.max` lines with human-readable rates next to the raw
//! kernel values.

use cgthrottle_common::types::{DeviceLimits, IoLimit};

/// Formats a byte count into a human-readable string (e.g., "128.0 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_rate(limit: IoLimit, unit: fn(u64) -> String) -> String {
    limit.bound().map_or_else(|| "unlimited".to_owned(), unit)
}

/// Summarizes one device's limits, e.g. `1:3  read 47.7 MiB/s, 1000 IOPS; write unlimited, unlimited`.
#[must_use]
pub fn describe_limits(limits: &DeviceLimits) -> String {
    let bps = |bytes: u64| format!("{}/s", format_bytes(bytes));
    let iops = |ops: u64| format!("{ops} IOPS");
    format!(
        "{}  read {}, {}; write {}, {}",
        limits.device,
        format_rate(limits.rbps, bps),
        format_rate(limits.riops, iops),
        format_rate(limits.wbps, bps),
        format_rate(limits.wiops, iops),
    )
}
