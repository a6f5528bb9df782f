//! Domain primitive types used across the cgthrottle workspace.

use std::fmt;

use crate::constants::MAX_TOKEN;

/// A single `io.max` throttle value.
///
/// `Unlimited` is kept apart from every numeric value, so the whole `u64`
/// range stays available for real limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IoLimit {
    /// No limit; rendered as `max`.
    #[default]
    Unlimited,
    /// A ceiling in bytes per second or operations per second.
    Bounded(u64),
}

impl IoLimit {
    /// Returns the numeric ceiling, or `None` when unlimited.
    #[must_use]
    pub const fn bound(self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Bounded(value) => Some(value),
        }
    }
}

impl fmt::Display for IoLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(MAX_TOKEN),
            Self::Bounded(value) => write!(f, "{value}"),
        }
    }
}

/// Kernel block device identifier, displayed as `major:minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    /// Major device number.
    pub major: u64,
    /// Minor device number.
    pub minor: u64,
}

impl DeviceId {
    /// Creates a device identifier from its two components.
    #[must_use]
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// The resolved limits for one device, ready to be written to `io.max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLimits {
    /// Target device.
    pub device: DeviceId,
    /// Read bytes per second.
    pub rbps: IoLimit,
    /// Write bytes per second.
    pub wbps: IoLimit,
    /// Read operations per second.
    pub riops: IoLimit,
    /// Write operations per second.
    pub wiops: IoLimit,
}

/// Renders the `io.max` line: `<maj:min> rbps=<R> wbps=<W> riops=<RI> wiops=<WI>`.
impl fmt::Display for DeviceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rbps={} wbps={} riops={} wiops={}",
            self.device, self.rbps, self.wbps, self.riops, self.wiops
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_displays_as_max() {
        assert_eq!(IoLimit::Unlimited.to_string(), "max");
    }

    #[test]
    fn bounded_displays_as_decimal() {
        assert_eq!(IoLimit::Bounded(1000).to_string(), "1000");
        assert_eq!(IoLimit::Bounded(0).to_string(), "0");
    }

    #[test]
    fn full_u64_range_is_not_mistaken_for_unlimited() {
        let limit = IoLimit::Bounded(u64::MAX);
        assert_eq!(limit.bound(), Some(u64::MAX));
        assert_eq!(limit.to_string(), u64::MAX.to_string());
    }

    #[test]
    fn device_id_displays_major_minor() {
        assert_eq!(DeviceId::new(8, 16).to_string(), "8:16");
        assert_eq!(DeviceId::new(259, 0).to_string(), "259:0");
    }

    #[test]
    fn device_limits_renders_io_max_line() {
        let limits = DeviceLimits {
            device: DeviceId::new(8, 0),
            rbps: IoLimit::Bounded(50_000_000),
            wbps: IoLimit::Unlimited,
            riops: IoLimit::Bounded(1000),
            wiops: IoLimit::Unlimited,
        };
        assert_eq!(
            limits.to_string(),
            "8:0 rbps=50000000 wbps=max riops=1000 wiops=max"
        );
    }
}
