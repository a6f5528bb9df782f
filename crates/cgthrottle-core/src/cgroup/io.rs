//! I/O throttling via the cgroups v2 `io.max` control file.
//!
//! `io.max` holds one line per throttled device:
//!
//! ```text
//! 8:0 rbps=52428800 wbps=max riops=1000 wiops=max
//! ```
//!
//! Updates are a read-modify-write of the whole file. The line for the target
//! device is replaced in place (or appended), and every other line is kept
//! in its original position.

#[cfg(target_os = "linux")]
use std::fs::{File, OpenOptions};
#[cfg(target_os = "linux")]
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(target_os = "linux")]
use nix::fcntl::{Flock, FlockArg};

use cgthrottle_common::constants::IO_MAX_FILE;
use cgthrottle_common::error::{Result, ThrottleError};
use cgthrottle_common::types::DeviceLimits;

/// Returns the non-empty lines currently in `<cgroup_path>/io.max`.
///
/// # Errors
///
/// Returns [`ThrottleError::ControlFile`] if the file cannot be read.
pub fn read_io_max(cgroup_path: &Path) -> Result<Vec<String>> {
    let path = cgroup_path.join(IO_MAX_FILE);
    let content = std::fs::read_to_string(&path).map_err(|source| control_err(&path, source))?;
    Ok(content
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Merges the line for `limits.device` into existing `io.max` content.
///
/// Blank lines are dropped. The first line whose leading token equals the
/// device identifier is replaced in place and any later line for the same
/// device is dropped. Without a match the new line is appended. Lines are joined with `\n` and no trailing newline.
#[must_use]
pub fn merge_io_max(content: &str, limits: &DeviceLimits) -> String {
    let device = limits.device.to_string();
    let new_line = limits.to_string();
    let mut found = false;
    let mut lines: Vec<&str> = Vec::new();

    for line in content.split('\n').filter(|line| !line.is_empty()) {
        if line.split_whitespace().next() == Some(device.as_str()) {
            if !found {
                lines.push(&new_line);
                found = true;
            }
        } else {
            lines.push(line);
        }
    }
    if !found {
        lines.push(&new_line);
    }
    lines.join("\n")
}

/// Writes the limits for one device into `<cgroup_path>/io.max`.
///
/// An exclusive advisory lock on the control file is held across the read
/// and the write, so concurrent cooperating writers cannot interleave. The
/// merged content goes out in a single write. The file is never created.
///
/// # Errors
///
/// Returns [`ThrottleError::ControlFile`] if the file cannot be opened,
/// locked, read, or written.
#[cfg(target_os = "linux")]
pub fn apply_device_io_limits(cgroup_path: &Path, limits: &DeviceLimits) -> Result<()> {
    let path = cgroup_path.join(IO_MAX_FILE);
    let _lock = lock_control_file(&path)?;

    let content = std::fs::read_to_string(&path).map_err(|source| control_err(&path, source))?;
    tracing::debug!(path = %path.display(), lines = content.lines().count(), "read io.max");
    let merged = merge_io_max(&content, limits);

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|source| control_err(&path, source))?;
    file.write_all(merged.as_bytes())
        .map_err(|source| control_err(&path, source))?;

    tracing::info!(device = %limits.device, line = %limits, "io.max updated");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: `io.max` exists only on Linux.
#[cfg(not(target_os = "linux"))]
pub fn apply_device_io_limits(_cgroup_path: &Path, _limits: &DeviceLimits) -> Result<()> {
    Err(ThrottleError::Unsupported {
        operation: "io.max update",
    })
}

#[cfg(target_os = "linux")]
fn lock_control_file(path: &Path) -> Result<Flock<File>> {
    let file = File::open(path).map_err(|source| control_err(path, source))?;
    Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, errno)| control_err(path, errno.into()))
}

fn control_err(path: &Path, source: std::io::Error) -> ThrottleError {
    ThrottleError::ControlFile {
        path: PathBuf::from(path),
        source,
    }
}
