//! # cgthrottle-core
//!
//! Translates a JSON description of per-device I/O throttling limits into
//! writes to the cgroup v2 `io.max` control file.
//!
//! The pipeline:
//! - **[`config`]**: parse, default, and validate the JSON document.
//! - **[`device`]**: resolve device node paths to `major:minor`.
//! - **[`quantity`]**: turn `"50M"`, `"1Gi"`, `"max"` into [`IoLimit`]s.
//! - **[`cgroup`]**: apply the resolved limits, merging each device line
//!   into `io.max` without disturbing the others.
//!
//! [`IoLimit`]: cgthrottle_common::types::IoLimit

pub mod cgroup;
pub mod config;
pub mod device;
pub mod quantity;

use std::path::Path;

use cgthrottle_common::error::Result;
use cgthrottle_common::types::DeviceLimits;

/// Parses `json` and applies it to the cgroup at `cgroup_path`.
///
/// # Errors
///
/// Returns any parse, validation, resolution, or control-file error.
pub fn apply_from_json_str(json: &str, cgroup_path: &Path) -> Result<Vec<DeviceLimits>> {
    apply_from_json_bytes(json.as_bytes(), cgroup_path)
}

/// Parses raw JSON bytes and applies them to the cgroup at `cgroup_path`.
///
/// # Errors
///
/// Returns any parse, validation, resolution, or control-file error.
pub fn apply_from_json_bytes(json: &[u8], cgroup_path: &Path) -> Result<Vec<DeviceLimits>> {
    let config = config::parse_config(json)?;
    cgroup::apply_io_limits(cgroup_path, &config)
}
