//! Block device resolution.
//!
//! Maps a device node path such as `/dev/sda` to the `major:minor` pair the
//! `io` controller keys its limits on.

use std::path::Path;

use cgthrottle_common::error::{Result, ThrottleError};
use cgthrottle_common::types::DeviceId;

/// Resolves the device identifier of the node at `path`.
///
/// The device number is split with the C library's `major()`/`minor()`
/// helpers, so extended (wide minor) numbering decodes correctly. A path
/// that is not a device node resolves to `0:0`.
///
/// # Errors
///
/// Returns [`ThrottleError::DeviceNotFound`] if `path` cannot be statted.
#[cfg(target_os = "linux")]
pub fn get_device_numbers(path: &Path) -> Result<DeviceId> {
    use nix::sys::stat;

    let st = stat::stat(path).map_err(|errno| ThrottleError::DeviceNotFound {
        path: path.to_path_buf(),
        source: errno.into(),
    })?;
    let device = DeviceId::new(stat::major(st.st_rdev), stat::minor(st.st_rdev));
    if st.st_rdev == 0 {
        tracing::warn!(path = %path.display(), "path is not a device node, resolved to 0:0");
    }
    tracing::debug!(path = %path.display(), %device, "device resolved");
    Ok(device)
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: device numbering is only decoded on Linux.
#[cfg(not(target_os = "linux"))]
pub fn get_device_numbers(_path: &Path) -> Result<DeviceId> {
    Err(ThrottleError::Unsupported {
        operation: "device number resolution",
    })
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn dev_null_resolves_to_1_3() {
        let device = get_device_numbers(Path::new("/dev/null")).unwrap();
        assert_eq!(device, DeviceId::new(1, 3));
        assert_eq!(device.to_string(), "1:3");
    }

    #[test]
    fn missing_path_is_device_not_found() {
        let err = get_device_numbers(Path::new("/dev/definitely-not-a-device")).unwrap_err();
        match err {
            ThrottleError::DeviceNotFound { path, source } => {
                assert_eq!(path, Path::new("/dev/definitely-not-a-device"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn regular_file_resolves_to_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = get_device_numbers(file.path()).unwrap();
        assert_eq!(device, DeviceId::new(0, 0));
    }
}
