//! Cgroups v2 I/O limit application.
//!
//! Walks a [`ThrottleConfig`] class by class (sorted by label), entry by
//! entry, and device by device (declaration order), resolving each device and
//! its four throttle values before merging the resulting line into the
//! cgroup's `io.max`.
//!
//! Application stops at the first failure. Devices already written during
//! the same call keep their new limits.

pub mod io;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cgthrottle_common::error::{Result, ThrottleError};
use cgthrottle_common::types::{DeviceId, DeviceLimits};

use crate::config::{QuotaConfig, ThrottleConfig};
use crate::device::get_device_numbers;
use crate::quantity::parse_value;

/// Handle to an existing cgroup directory.
#[derive(Debug, Clone)]
pub struct Cgroup {
    path: PathBuf,
}

impl Cgroup {
    /// Opens the cgroup at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::CgroupNotFound`] if `path` is not a directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(ThrottleError::CgroupNotFound { path });
        }
        Ok(Self { path })
    }

    /// Path to this cgroup's directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies every device limit in `config` to this cgroup.
    ///
    /// When several entries target the same device, the one applied last
    /// wins; differing limits for one device are reported with a warning.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, parse, or control-file failure, wrapped
    /// with the class, entry index, and field or device it came from.
    pub fn apply_io_limits(&self, config: &ThrottleConfig) -> Result<Vec<DeviceLimits>> {
        tracing::info!(path = %self.path.display(), "applying I/O limits");
        let mut applied = Vec::new();
        let mut seen: HashMap<DeviceId, (&str, usize, DeviceLimits)> = HashMap::new();

        for (class, index, quota, device) in targets(config) {
            let limits = resolve_limits(class, index, quota, device)?;
            let replaced = seen.insert(limits.device, (class, index, limits));
            if let Some((prev_class, prev_index, previous)) = replaced {
                if previous != limits {
                    tracing::warn!(
                        device = %limits.device,
                        overridden = %format!("{prev_class}[{prev_index}]"),
                        by = %format!("{class}[{index}]"),
                        "conflicting limits for device, last one wins"
                    );
                }
            }

            io::apply_device_io_limits(&self.path, &limits)
                .map_err(|e| e.in_entry(class, index, format!("device {}", device.display())))?;
            applied.push(limits);
        }

        tracing::info!(devices = applied.len(), "I/O limits applied");
        Ok(applied)
    }
}

/// Applies `config` to the cgroup at `cgroup_path`.
///
/// # Errors
///
/// Returns [`ThrottleError::CgroupNotFound`] before touching any file if the
/// cgroup is missing, otherwise see [`Cgroup::apply_io_limits`].
pub fn apply_io_limits(cgroup_path: &Path, config: &ThrottleConfig) -> Result<Vec<DeviceLimits>> {
    Cgroup::open(cgroup_path)?.apply_io_limits(config)
}

/// Resolves every device limit in `config` without writing anything.
///
/// # Errors
///
/// Returns the first resolution or parse failure, with entry context.
pub fn plan_io_limits(config: &ThrottleConfig) -> Result<Vec<DeviceLimits>> {
    targets(config)
        .map(|(class, index, quota, device)| resolve_limits(class, index, quota, device))
        .collect()
}

/// Resolves the limits of one quota entry for one of its devices.
///
/// # Errors
///
/// Returns [`ThrottleError::Entry`] wrapping a
/// [`ThrottleError::DeviceNotFound`] or [`ThrottleError::InvalidValue`].
pub fn resolve_limits(
    class: &str,
    index: usize,
    quota: &QuotaConfig,
    device: &Path,
) -> Result<DeviceLimits> {
    let id = get_device_numbers(device)
        .map_err(|e| e.in_entry(class, index, format!("device {}", device.display())))?;
    let field = |name: &str, text: &str| parse_value(text).map_err(|e| e.in_entry(class, index, name));

    let limits = DeviceLimits {
        device: id,
        rbps: field("ThrottleReadBps", &quota.throttle_read_bps)?,
        wbps: field("ThrottleWriteBps", &quota.throttle_write_bps)?,
        riops: field("ThrottleReadIOPS", &quota.throttle_read_iops)?,
        wiops: field("ThrottleWriteIOPS", &quota.throttle_write_iops)?,
    };
    tracing::debug!(class, index, line = %limits, "limits resolved");
    Ok(limits)
}

/// Every `(class, entry index, entry, device)` in application order.
fn targets(config: &ThrottleConfig) -> impl Iterator<Item = (&str, usize, &QuotaConfig, &Path)> {
    config.classes.iter().flat_map(|(class, quotas)| {
        quotas.iter().enumerate().flat_map(move |(index, quota)| {
            quota
                .devices
                .iter()
                .map(move |device| (class.as_str(), index, quota, device.as_path()))
        })
    })
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::config::parse_config_str;
    use cgthrottle_common::constants::IO_MAX_FILE;
    use cgthrottle_common::types::IoLimit;
    use std::sync::{Arc, Mutex};

    fn cgroup_with(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IO_MAX_FILE), content).unwrap();
        dir
    }

    fn io_max(dir: &tempfile::TempDir) -> String {
        std::fs::read_to_string(dir.path().join(IO_MAX_FILE)).unwrap()
    }

    #[test]
    fn apply_replaces_existing_device_line() {
        let dir = cgroup_with("1:3 rbps=max wbps=max riops=max wiops=max\n");
        let config = parse_config_str(
            r#"{"Classes": {"quota": [{"Devices": ["/dev/null"], "ThrottleReadBps": "50M"}]}}"#,
        )
        .unwrap();

        let applied = apply_io_limits(dir.path(), &config).unwrap();

        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].rbps, IoLimit::Bounded(50_000_000));
        assert_eq!(io_max(&dir), "1:3 rbps=50000000 wbps=max riops=max wiops=max");
    }

    #[test]
    fn apply_missing_cgroup_fails_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-a-cgroup");
        let config = parse_config_str(r#"{"Classes": {"c": [{"Devices": ["/dev/null"]}]}}"#).unwrap();

        let err = apply_io_limits(&missing, &config).unwrap_err();

        assert!(matches!(err, ThrottleError::CgroupNotFound { .. }), "got: {err:?}");
        assert!(!missing.exists());
    }

    #[test]
    fn apply_on_regular_file_is_cgroup_not_found() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Cgroup::open(file.path()).unwrap_err();
        assert!(matches!(err, ThrottleError::CgroupNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn apply_invalid_value_reports_class_index_and_field() {
        let dir = cgroup_with("");
        let config = parse_config_str(
            r#"{"Classes": {"gold": [
                {"Devices": ["/dev/null"]},
                {"Devices": ["/dev/zero"], "ThrottleWriteIOPS": "10X"}
            ]}}"#,
        )
        .unwrap();

        let err = apply_io_limits(dir.path(), &config).unwrap_err();

        match &err {
            ThrottleError::Entry { class, index, field, source } => {
                assert_eq!(class, "gold");
                assert_eq!(*index, 1);
                assert_eq!(field, "ThrottleWriteIOPS");
                assert!(matches!(**source, ThrottleError::InvalidValue { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The first entry was written before the failure and stays applied.
        assert_eq!(io_max(&dir), "1:3 rbps=max wbps=max riops=max wiops=max");
    }

    #[test]
    fn apply_missing_device_reports_device_path() {
        let dir = cgroup_with("");
        let config =
            parse_config_str(r#"{"Classes": {"c": [{"Devices": ["/dev/no-such-disk"]}]}}"#).unwrap();

        let err = apply_io_limits(dir.path(), &config).unwrap_err();

        assert!(matches!(err.root(), ThrottleError::DeviceNotFound { .. }), "got: {err:?}");
        assert!(err.to_string().contains("/dev/no-such-disk"), "got: {err}");
        assert_eq!(io_max(&dir), "");
    }

    #[test]
    fn apply_later_class_wins_for_shared_device() {
        let dir = cgroup_with("");
        let config = parse_config_str(
            r#"{"Classes": {
                "b-second": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "200"}],
                "a-first": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "100"}]
            }}"#,
        )
        .unwrap();

        let applied = apply_io_limits(dir.path(), &config).unwrap();

        assert_eq!(applied.len(), 2);
        assert_eq!(io_max(&dir), "1:3 rbps=max wbps=max riops=200 wiops=max");
    }

    #[test]
    fn apply_control_file_failure_reports_class_and_device() {
        let dir = tempfile::tempdir().unwrap();
        let config = parse_config_str(r#"{"Classes": {"slow": [{"Devices": ["/dev/null"]}]}}"#).unwrap();

        let err = apply_io_limits(dir.path(), &config).unwrap_err();

        assert!(matches!(err.root(), ThrottleError::ControlFile { .. }), "got: {err:?}");
        let msg = err.to_string();
        assert!(msg.contains("slow[0]") && msg.contains("/dev/null"), "got: {msg}");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warnings_while_applying(json: &str) -> String {
        let dir = cgroup_with("");
        let config = parse_config_str(json).unwrap();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let _ = tracing::subscriber::with_default(subscriber, || {
            apply_io_limits(dir.path(), &config).unwrap()
        });

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn apply_warns_when_classes_disagree_on_a_device() {
        let logs = warnings_while_applying(
            r#"{"Classes": {
                "b-second": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "200"}],
                "a-first": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "100"}]
            }}"#,
        );

        assert!(logs.contains("conflicting limits for device"), "got: {logs}");
        assert!(logs.contains("a-first[0]") && logs.contains("b-second[0]"), "got: {logs}");
    }

    #[test]
    fn apply_stays_quiet_when_repeated_limits_agree() {
        let logs = warnings_while_applying(
            r#"{"Classes": {
                "a": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "100"}],
                "b": [{"Devices": ["/dev/null"], "ThrottleReadIOPS": "100"}]
            }}"#,
        );

        assert_eq!(logs, "");
    }

    #[test]
    fn apply_multiple_devices_in_declaration_order() {
        let dir = cgroup_with("8:0 rbps=1 wbps=1 riops=1 wiops=1\n");
        let config = parse_config_str(
            r#"{"Classes": {"c": [{"Devices": ["/dev/zero", "/dev/null"], "ThrottleWriteBps": "1Ki"}]}}"#,
        )
        .unwrap();

        let _ = apply_io_limits(dir.path(), &config).unwrap();

        assert_eq!(
            io_max(&dir),
            "8:0 rbps=1 wbps=1 riops=1 wiops=1\n\
             1:5 rbps=max wbps=1024 riops=max wiops=max\n\
             1:3 rbps=max wbps=1024 riops=max wiops=max"
        );
    }

    #[test]
    fn plan_resolves_without_touching_files() {
        let config = parse_config_str(
            r#"{"Classes": {"c": [{"Devices": ["/dev/null"], "ThrottleReadBps": "5M", "ThrottleWriteIOPS": "800"}]}}"#,
        )
        .unwrap();

        let planned = plan_io_limits(&config).unwrap();

        assert_eq!(planned.len(), 1);
        assert_eq!(
            planned[0].to_string(),
            "1:3 rbps=5000000 wbps=max riops=max wiops=800"
        );
    }
}
