//! System-wide constants and default paths.

/// Name of the `io` controller's per-device throttling control file.
pub const IO_MAX_FILE: &str = "io.max";

/// Token the kernel uses in `io.max` for an unbounded field.
pub const MAX_TOKEN: &str = "max";

/// Spellings accepted (case-insensitively) as "no limit" in configurations.
pub const UNLIMITED_KEYWORDS: [&str; 2] = ["max", "unlimited"];

/// Default written into throttle fields left empty in a configuration.
pub const DEFAULT_THROTTLE_VALUE: &str = "max";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "throttleapply";
